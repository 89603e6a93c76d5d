use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use pixfan_core::TargetFormat;
use std::io::Cursor;

use crate::traits::TranscodeError;

/// Quality presets for lossy encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    #[default]
    Normal,
    Better,
    Best,
    Lighter,
}

impl QualityPreset {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(QualityPreset::Normal),
            "better" => Ok(QualityPreset::Better),
            "best" => Ok(QualityPreset::Best),
            "lighter" => Ok(QualityPreset::Lighter),
            _ => Err(format!("Invalid quality preset: {}", s)),
        }
    }

    /// JPEG quality (0-100)
    pub fn jpeg_quality(self) -> f32 {
        match self {
            QualityPreset::Normal => 75.0,
            QualityPreset::Better => 85.0,
            QualityPreset::Best => 95.0,
            QualityPreset::Lighter => 65.0,
        }
    }

    /// WebP quality (0-100)
    pub fn webp_quality(self) -> f32 {
        match self {
            QualityPreset::Normal => 80.0,
            QualityPreset::Better => 90.0,
            QualityPreset::Best => 98.0,
            QualityPreset::Lighter => 70.0,
        }
    }

    /// AVIF quality (0-100)
    pub fn avif_quality(self) -> f32 {
        match self {
            QualityPreset::Normal => 70.0,
            QualityPreset::Better => 80.0,
            QualityPreset::Best => 90.0,
            QualityPreset::Lighter => 60.0,
        }
    }
}

/// Encodes decoded images into the target formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEncoder {
    quality: QualityPreset,
}

impl ImageEncoder {
    pub fn new(quality: QualityPreset) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    pub fn encode(&self, img: &DynamicImage, format: TargetFormat) -> Result<Bytes, TranscodeError> {
        let encoded = match format {
            TargetFormat::Jpeg => self.encode_jpeg(img),
            TargetFormat::Png => encode_with_image(img, ImageFormat::Png),
            TargetFormat::Webp => Ok(self.encode_webp(img)),
            TargetFormat::Gif => {
                // The GIF encoder only takes 8-bit RGBA.
                encode_with_image(&DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::Gif)
            }
            TargetFormat::Avif => self.encode_avif(img),
        };

        encoded.map_err(|message| TranscodeError::Encode { format, message })
    }

    /// JPEG via mozjpeg
    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Bytes, String> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(self.quality.jpeg_quality());
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new()).map_err(|e| e.to_string())?;
        comp.write_scanlines(&rgb_img).map_err(|e| e.to_string())?;
        let jpeg_data = comp.finish().map_err(|e| e.to_string())?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Lossy WebP via libwebp
    fn encode_webp(&self, img: &DynamicImage) -> Bytes {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(self.quality.webp_quality());

        Bytes::copy_from_slice(&webp_data)
    }

    /// AVIF via ravif
    fn encode_avif(&self, img: &DynamicImage) -> Result<Bytes, String> {
        let (width, height) = img.dimensions();
        let rgb_img = img.to_rgb8();

        let rgb_data: Vec<rgb::RGB8> = rgb_img
            .as_raw()
            .chunks_exact(3)
            .map(|chunk| rgb::RGB8::new(chunk[0], chunk[1], chunk[2]))
            .collect();

        let img_buf = ravif::Img::new(rgb_data.as_slice(), width as usize, height as usize);

        let encoder = ravif::Encoder::new()
            .with_quality(self.quality.avif_quality())
            .with_speed(6);

        let avif_data = encoder.encode_rgb(img_buf).map_err(|e| e.to_string())?;

        Ok(Bytes::from(avif_data.avif_file))
    }
}

fn encode_with_image(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, String> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|e| e.to_string())?;
    Ok(Bytes::from(buffer))
}
