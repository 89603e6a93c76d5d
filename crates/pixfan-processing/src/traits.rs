use bytes::Bytes;
use pixfan_core::TargetFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: TargetFormat,
        message: String,
    },

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
}

/// Re-encoded image and the dimensions it was encoded at.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub data: Bytes,
    pub format: TargetFormat,
    pub width: u32,
    pub height: u32,
}

impl Transcoded {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Stateless pixel transform applied by the conversion endpoints.
///
/// Implementations are CPU-bound and synchronous; async callers run them on
/// the blocking pool.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, source: &[u8], format: TargetFormat) -> Result<Transcoded, TranscodeError>;
}
