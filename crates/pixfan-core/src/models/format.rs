use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Target image format a conversion can produce.
///
/// The token (`as_str`) is used both as the output name suffix and as the
/// `image/<token>` content type; only that exact token parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Avif,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported format: {0}")]
pub struct UnknownFormat(pub String);

impl TargetFormat {
    pub const ALL: [TargetFormat; 5] = [
        TargetFormat::Jpeg,
        TargetFormat::Png,
        TargetFormat::Webp,
        TargetFormat::Gif,
        TargetFormat::Avif,
    ];

    /// Parse a format token. Surrounding whitespace is ignored; otherwise
    /// only the exact lowercase token is accepted, because the token is also
    /// the output name suffix and the `image/<token>` subtype.
    pub fn parse(s: &str) -> Result<Self, UnknownFormat> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s.trim())
            .ok_or_else(|| UnknownFormat(s.trim().to_string()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::Gif => "gif",
            TargetFormat::Avif => "avif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::Webp => "image/webp",
            TargetFormat::Gif => "image/gif",
            TargetFormat::Avif => "image/avif",
        }
    }

    /// Output object name for a base name: `<base>.<token>`.
    pub fn output_name(self, base: &str) -> String {
        format!("{}.{}", base, self.as_str())
    }

    /// Infer the format from a file name extension, if it is one we produce.
    /// Extensions are matched case-insensitively and `jpg` counts as `jpeg`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" => Some(TargetFormat::Jpeg),
            ext => Self::parse(ext).ok(),
        }
    }
}

impl FromStr for TargetFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for TargetFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_canonical_tokens() {
        assert_eq!(TargetFormat::parse("jpeg").unwrap(), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::parse(" webp ").unwrap(), TargetFormat::Webp);
        assert_eq!(TargetFormat::parse("avif").unwrap(), TargetFormat::Avif);
    }

    #[test]
    fn parse_rejects_aliases_and_other_case() {
        // The token becomes the output suffix, so `jpg` would name a `.jpeg`
        // object something the caller did not ask for.
        assert_eq!(
            TargetFormat::parse("jpg"),
            Err(UnknownFormat("jpg".to_string()))
        );
        assert_eq!(
            TargetFormat::parse("WEBP"),
            Err(UnknownFormat("WEBP".to_string()))
        );
    }

    #[test]
    fn parse_rejects_unknown_tokens() {
        assert_eq!(
            TargetFormat::parse("tiff"),
            Err(UnknownFormat("tiff".to_string()))
        );
        assert!(TargetFormat::parse("").is_err());
    }

    #[test]
    fn content_type_follows_canonical_token() {
        for format in TargetFormat::ALL {
            assert_eq!(format.content_type(), format!("image/{}", format.as_str()));
        }
    }

    #[test]
    fn output_name_appends_canonical_suffix() {
        assert_eq!(TargetFormat::Jpeg.output_name("out1"), "out1.jpeg");
        assert_eq!(TargetFormat::Webp.output_name("a/b"), "a/b.webp");
    }

    #[test]
    fn from_file_name_uses_extension() {
        assert_eq!(
            TargetFormat::from_file_name("out1.webp"),
            Some(TargetFormat::Webp)
        );
        assert_eq!(
            TargetFormat::from_file_name("photo.JPG"),
            Some(TargetFormat::Jpeg)
        );
        assert_eq!(TargetFormat::from_file_name("README"), None);
        assert_eq!(TargetFormat::from_file_name("notes.txt"), None);
    }
}
