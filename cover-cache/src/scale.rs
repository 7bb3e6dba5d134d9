//! Decode-time downsampling and deterministic re-encoding.
//!
//! Raw cover bytes are decoded under a pixel budget derived from the
//! requested size class, then re-encoded as JPEG at a fixed quality for
//! storage. The stored artifact is always the lossy, uniformly-recompressed
//! version, even on the very first insert, so repeated reads never drift
//! through incremental re-compression.

use crate::error::Result;
use crate::key::{SizeClass, SizeTable};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Quality of the stored JPEG re-encode. Compatibility constant.
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy)]
pub struct Downsampler {
    sizes: SizeTable,
}

impl Downsampler {
    pub fn new(sizes: SizeTable) -> Self {
        Self { sizes }
    }

    /// Integer subsample factor for an image of `width`x`height` pixels
    /// decoded for `class`.
    ///
    /// `round(sqrt(pixels / budget))` when the intrinsic pixel count
    /// exceeds the class's squared-dimension budget, else 1. Clamped by a
    /// class-dependent cap: Medium and Large trade at most a factor of 2
    /// for memory, thumbnails accept up to 4.
    pub fn subsample_factor(&self, width: u32, height: u32, class: SizeClass) -> u32 {
        let target = self.sizes.dimension(class) as u64;
        let budget = target * target;
        let pixels = width as u64 * height as u64;

        let factor = if pixels > budget {
            (pixels as f64 / budget as f64).sqrt().round() as u32
        } else {
            1
        };

        let cap = if class >= SizeClass::Medium { 2 } else { 4 };
        factor.clamp(1, cap)
    }

    /// Decode raw image bytes bounded by the class's pixel budget.
    ///
    /// Probes the intrinsic dimensions first (no full decode), picks the
    /// subsample factor, then decodes and downscales in one pass. The
    /// result is plain RGB; alpha has no place in stored covers.
    pub fn process(&self, raw: &[u8], class: SizeClass) -> Result<DynamicImage> {
        let (width, height) = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()?
            .into_dimensions()?;

        let factor = self.subsample_factor(width, height, class);
        let image = image::load_from_memory(raw)?;
        let image = if factor > 1 {
            debug!(width, height, factor, ?class, "Subsampling cover");
            image.resize_exact(
                (width / factor).max(1),
                (height / factor).max(1),
                FilterType::Triangle,
            )
        } else {
            image
        };

        Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
    }

    /// Encode a bitmap to the stored JPEG form at [`JPEG_QUALITY`].
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
        image.write_with_encoder(encoder)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn scaler() -> Downsampler {
        Downsampler::new(SizeTable::new(100, 500, 1080))
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([180, 40, 40]),
        ));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_factor_for_oversized_image() {
        let scaler = scaler();

        // 2000^2 / 500^2 = 16, sqrt = 4; Medium caps at 2
        assert_eq!(scaler.subsample_factor(2000, 2000, SizeClass::Medium), 2);
        // Small's budget is 100^2: sqrt(400) = 20, capped at 4
        assert_eq!(scaler.subsample_factor(2000, 2000, SizeClass::Small), 4);
        // Large has headroom: sqrt(2000^2/1080^2) rounds to 2
        assert_eq!(scaler.subsample_factor(2000, 2000, SizeClass::Large), 2);
    }

    #[test]
    fn test_factor_is_one_within_budget() {
        let scaler = scaler();
        assert_eq!(scaler.subsample_factor(400, 400, SizeClass::Medium), 1);
        assert_eq!(scaler.subsample_factor(500, 500, SizeClass::Medium), 1);
        assert_eq!(scaler.subsample_factor(1, 1, SizeClass::Small), 1);
    }

    #[test]
    fn test_factor_rounds_to_nearest() {
        let scaler = scaler();
        // 120^2 / 100^2 = 1.44, sqrt = 1.2, rounds to 1
        assert_eq!(scaler.subsample_factor(120, 120, SizeClass::Small), 1);
        // 160^2 / 100^2 = 2.56, sqrt = 1.6, rounds to 2
        assert_eq!(scaler.subsample_factor(160, 160, SizeClass::Small), 2);
    }

    #[test]
    fn test_process_subsamples_oversized_image() {
        let scaler = scaler();
        let raw = jpeg_bytes(800, 600);

        // 800*600 over 100^2: sqrt(48) ~= 6.9, rounds to 7, capped at 4
        let image = scaler.process(&raw, SizeClass::Small).unwrap();
        assert_eq!(image.width(), 200);
        assert_eq!(image.height(), 150);
    }

    #[test]
    fn test_process_keeps_small_image_unscaled() {
        let scaler = scaler();
        let raw = jpeg_bytes(64, 64);

        let image = scaler.process(&raw, SizeClass::Large).unwrap();
        assert_eq!(image.width(), 64);
        assert_eq!(image.height(), 64);
    }

    #[test]
    fn test_process_rejects_garbage() {
        let scaler = scaler();
        assert!(scaler.process(b"not an image", SizeClass::Small).is_err());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let scaler = scaler();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([0, 99, 0])));

        let first = scaler.encode(&image).unwrap();
        let second = scaler.encode(&image).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_processed_image_fits_pixel_budget_for_oversized_covers() {
        let scaler = scaler();
        let raw = jpeg_bytes(2000, 2000);

        // 2000^2 / 500^2 = 16, sqrt = 4, Medium caps the factor at 2
        let image = scaler.process(&raw, SizeClass::Medium).unwrap();
        assert_eq!(image.width(), 1000);
        assert_eq!(image.height(), 1000);
    }
}
