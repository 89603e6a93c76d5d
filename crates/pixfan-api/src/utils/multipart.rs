//! Multipart parsing for the direct upload surface.

use axum::extract::Multipart;
use bytes::Bytes;
use pixfan_core::{AppError, TargetFormat};

use crate::error::HttpAppError;

/// A validated direct upload: `image` bytes to convert to `format` and store
/// as `{name}.{format}`.
#[derive(Debug)]
pub struct DirectUpload {
    pub format: TargetFormat,
    pub name: String,
    pub image: Bytes,
}

impl DirectUpload {
    pub fn output_name(&self) -> String {
        self.format.output_name(&self.name)
    }
}

/// Read the `image`, `format` and `name` fields. Unknown fields are skipped;
/// a repeated `image` field is rejected.
pub async fn extract_direct_upload(mut multipart: Multipart) -> Result<DirectUpload, HttpAppError> {
    let mut image: Option<Bytes> = None;
    let mut format: Option<String> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "image" => {
                if image.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple image fields are not allowed; send exactly one field named 'image'"
                            .to_string(),
                    )
                    .into());
                }
                image = Some(field.bytes().await?);
            }
            "format" => format = Some(field.text().await?),
            "name" => name = Some(field.text().await?),
            other => {
                tracing::debug!(field = %other, "Ignoring unexpected multipart field");
            }
        }
    }

    let format = required("format", format)?;
    let name = required("name", name)?;
    let image = match image {
        Some(bytes) if !bytes.is_empty() => bytes,
        Some(_) => return Err(AppError::InvalidInput("Image is empty".to_string()).into()),
        None => {
            return Err(AppError::InvalidInput("Missing required field 'image'".to_string()).into())
        }
    };

    let format = TargetFormat::parse(&format).map_err(|e| AppError::InvalidInput(e.to_string()))?;

    Ok(DirectUpload {
        format,
        name,
        image,
    })
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!(
            "Missing required field '{}'",
            field
        ))),
    }
}
