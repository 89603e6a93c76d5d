use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::format::TargetFormat;

/// Body of one conversion task: produce `name` in `format` from `source`.
///
/// Carried form-encoded (`format=..&source=..&name=..`) so the endpoint can be
/// invoked by the task queue or by hand with the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversionPayload {
    pub format: TargetFormat,
    /// Key of the source object in the source bucket
    pub source: String,
    /// Key of the output object in the destination bucket
    pub name: String,
}

impl ConversionPayload {
    /// Validate raw form fields. A missing or blank field, or an unknown
    /// format, is an input error.
    pub fn from_fields(
        format: Option<&str>,
        source: Option<&str>,
        name: Option<&str>,
    ) -> Result<Self, AppError> {
        let format = required("format", format)?;
        let source = required("source", source)?;
        let name = required("name", name)?;

        let format = TargetFormat::parse(format).map_err(|e| AppError::InvalidInput(e.to_string()))?;

        Ok(Self {
            format,
            source: source.to_string(),
            name: name.to_string(),
        })
    }

    pub fn to_form_body(&self) -> String {
        format!(
            "format={}&source={}&name={}",
            urlencoding::encode(self.format.as_str()),
            urlencoding::encode(&self.source),
            urlencoding::encode(&self.name),
        )
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!(
            "Missing required field '{}'",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_body_escapes_keys() {
        let payload = ConversionPayload {
            format: TargetFormat::Webp,
            source: "uploads/photo 1.png".to_string(),
            name: "out&1.webp".to_string(),
        };
        assert_eq!(
            payload.to_form_body(),
            "format=webp&source=uploads%2Fphoto%201.png&name=out%261.webp"
        );
    }

    #[test]
    fn from_fields_requires_every_field() {
        let ok = ConversionPayload::from_fields(Some("webp"), Some("photo1"), Some("out1.webp"))
            .unwrap();
        assert_eq!(ok.format, TargetFormat::Webp);

        for (format, source, name, missing) in [
            (None, Some("photo1"), Some("out1.webp"), "format"),
            (Some("webp"), None, Some("out1.webp"), "source"),
            (Some("webp"), Some("photo1"), Some("  "), "name"),
        ] {
            match ConversionPayload::from_fields(format, source, name) {
                Err(AppError::InvalidInput(msg)) => assert!(msg.contains(missing), "{}", msg),
                other => panic!("expected InvalidInput, got {:?}", other),
            }
        }
    }

    #[test]
    fn from_fields_rejects_unknown_format() {
        let err = ConversionPayload::from_fields(Some("heic"), Some("photo1"), Some("out1.heic"))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg.contains("heic")));
    }
}
