use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use pixfan_core::TargetFormat;
use std::io::Cursor;

use crate::compression::{ImageEncoder, QualityPreset};
use crate::traits::{TranscodeError, Transcoded, Transcoder};

/// Decode an image of any supported container, guessing the format from its
/// leading bytes.
pub fn decode(source: &[u8]) -> Result<DynamicImage, TranscodeError> {
    if source.is_empty() {
        return Err(TranscodeError::Decode("source is empty".to_string()));
    }

    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| TranscodeError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| TranscodeError::Decode(e.to_string()))
}

/// Half of a dimension, rounded down, never below one pixel.
pub fn half(dimension: u32) -> u32 {
    (dimension / 2).max(1)
}

/// The fixed conversion policy: halve width and height (Lanczos3) and
/// re-encode in the requested format.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfSizeTranscoder {
    encoder: ImageEncoder,
}

impl HalfSizeTranscoder {
    pub fn new(quality: QualityPreset) -> Self {
        Self {
            encoder: ImageEncoder::new(quality),
        }
    }
}

impl Transcoder for HalfSizeTranscoder {
    fn transcode(&self, source: &[u8], format: TargetFormat) -> Result<Transcoded, TranscodeError> {
        let start = std::time::Instant::now();
        let img = decode(source)?;
        let (src_width, src_height) = img.dimensions();

        let width = half(src_width);
        let height = half(src_height);
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);

        let data = self.encoder.encode(&resized, format)?;

        tracing::debug!(
            format = %format,
            src_width,
            src_height,
            width,
            height,
            input_bytes = source.len(),
            output_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image transcoded"
        );

        Ok(Transcoded {
            data,
            format,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn create_test_image(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 64])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn halves_800x600_for_each_decodable_format() {
        let source = create_test_image(800, 600);
        let transcoder = HalfSizeTranscoder::default();

        for format in [TargetFormat::Webp, TargetFormat::Jpeg, TargetFormat::Png] {
            let out = transcoder.transcode(&source, format).unwrap();
            assert_eq!((out.width, out.height), (400, 300));
            assert_eq!(out.content_type(), format!("image/{}", format));

            let decoded = image::load_from_memory(&out.data).unwrap();
            assert_eq!(decoded.dimensions(), (400, 300), "{}", format);
        }
    }

    #[test]
    fn odd_dimensions_round_down() {
        let source = create_test_image(801, 599);
        let out = HalfSizeTranscoder::default()
            .transcode(&source, TargetFormat::Png)
            .unwrap();
        assert_eq!((out.width, out.height), (400, 299));
    }

    #[test]
    fn single_pixel_stays_one_pixel() {
        let source = create_test_image(1, 3);
        let out = HalfSizeTranscoder::default()
            .transcode(&source, TargetFormat::Png)
            .unwrap();
        assert_eq!((out.width, out.height), (1, 1));
    }

    #[test]
    fn avif_output_is_halved() {
        let source = create_test_image(64, 32);
        let out = HalfSizeTranscoder::new(QualityPreset::Lighter)
            .transcode(&source, TargetFormat::Avif)
            .unwrap();
        assert_eq!((out.width, out.height), (32, 16));
        assert_eq!(&out.data[4..8], b"ftyp");
    }

    #[test]
    fn transcoding_is_deterministic() {
        let source = create_test_image(120, 80);
        let transcoder = HalfSizeTranscoder::default();
        let first = transcoder.transcode(&source, TargetFormat::Webp).unwrap();
        let second = transcoder.transcode(&source, TargetFormat::Webp).unwrap();
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = HalfSizeTranscoder::default()
            .transcode(b"definitely not an image", TargetFormat::Jpeg)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));

        let err = HalfSizeTranscoder::default()
            .transcode(&[], TargetFormat::Jpeg)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));
    }
}
