use image::imageops::FilterType;
use image::GenericImageView;
use pixfan_core::TargetFormat;

use crate::compression::ImageEncoder;
use crate::transcoder::decode;
use crate::traits::{TranscodeError, Transcoded};

/// Largest box side a caller may ask for.
pub const MAX_FIT_DIMENSION: u32 = 8192;

/// Requested bounding box; either side may be left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FitBox {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FitBox {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    /// Each given side must be within `1..=MAX_FIT_DIMENSION`.
    pub fn validate(&self) -> Result<(), TranscodeError> {
        for side in [self.width, self.height].into_iter().flatten() {
            if side == 0 || side > MAX_FIT_DIMENSION {
                return Err(TranscodeError::InvalidDimensions(format!(
                    "width and height must be between 1 and {}",
                    MAX_FIT_DIMENSION
                )));
            }
        }
        Ok(())
    }
}

/// Shrink the image so it fits inside `fit`, preserving aspect ratio, then
/// encode as `format`. Images already inside the box keep their size.
pub fn resize_to_fit(
    source: &[u8],
    fit: FitBox,
    format: TargetFormat,
    encoder: &ImageEncoder,
) -> Result<Transcoded, TranscodeError> {
    fit.validate()?;

    let img = decode(source)?;
    let (src_width, src_height) = img.dimensions();
    let max_width = fit.width.map_or(src_width, |w| w.min(src_width));
    let max_height = fit.height.map_or(src_height, |h| h.min(src_height));

    let resized = if max_width == src_width && max_height == src_height {
        img
    } else {
        img.resize(max_width, max_height, FilterType::Lanczos3)
    };
    let (width, height) = resized.dimensions();
    let data = encoder.encode(&resized, format)?;

    Ok(Transcoded {
        data,
        format,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn width_only_keeps_aspect_ratio() {
        let out = resize_to_fit(
            &png(400, 300),
            FitBox {
                width: Some(200),
                height: None,
            },
            TargetFormat::Png,
            &ImageEncoder::default(),
        )
        .unwrap();
        assert_eq!((out.width, out.height), (200, 150));
    }

    #[test]
    fn box_limits_the_tighter_side() {
        let out = resize_to_fit(
            &png(400, 300),
            FitBox {
                width: Some(100),
                height: Some(100),
            },
            TargetFormat::Jpeg,
            &ImageEncoder::default(),
        )
        .unwrap();
        assert_eq!((out.width, out.height), (100, 75));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let err = resize_to_fit(
            &png(4, 4),
            FitBox {
                width: Some(0),
                height: None,
            },
            TargetFormat::Png,
            &ImageEncoder::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidDimensions(_)));
    }

    #[test]
    fn never_upscales() {
        let out = resize_to_fit(
            &png(200, 100),
            FitBox {
                width: Some(4000),
                height: None,
            },
            TargetFormat::Png,
            &ImageEncoder::default(),
        )
        .unwrap();
        assert_eq!((out.width, out.height), (200, 100));

        let out = resize_to_fit(
            &png(200, 100),
            FitBox {
                width: Some(1000),
                height: Some(50),
            },
            TargetFormat::Png,
            &ImageEncoder::default(),
        )
        .unwrap();
        assert_eq!((out.width, out.height), (100, 50));
    }

    #[test]
    fn oversized_box_is_rejected() {
        let err = resize_to_fit(
            &png(4, 4),
            FitBox {
                width: Some(100_000),
                height: None,
            },
            TargetFormat::Png,
            &ImageEncoder::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidDimensions(_)));
    }
}
