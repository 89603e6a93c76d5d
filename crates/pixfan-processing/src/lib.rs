//! Pixfan Processing Library
//!
//! Decode, resize and re-encode. [`HalfSizeTranscoder`] implements the
//! conversion policy (half width, half height); [`resize_to_fit`] backs
//! on-the-fly resizing when serving images.

pub mod compression;
pub mod resize;
pub mod traits;
pub mod transcoder;

pub use compression::{ImageEncoder, QualityPreset};
pub use resize::{resize_to_fit, FitBox, MAX_FIT_DIMENSION};
pub use traits::{TranscodeError, Transcoded, Transcoder};
pub use transcoder::HalfSizeTranscoder;
