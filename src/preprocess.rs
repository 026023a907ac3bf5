//! Image preprocessing for recognition
//!
//! Converts an arbitrary source image into the single-channel 8-bit buffer
//! the recognition engine consumes, applying the configured downscale factor.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::error::PreprocessError;

/// Fully-readable grayscale pixel buffer, one byte per pixel, stride = width.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    /// Bytes per pixel of the buffer format.
    pub const BYTES_PER_PIXEL: u32 = 1;

    /// Bytes per row.
    pub fn stride(&self) -> u32 {
        self.width * Self::BYTES_PER_PIXEL
    }
}

/// Prepare a source image for recognition.
///
/// With `scale == 1.0` and an already-grayscale source the existing buffer
/// is taken as-is. Otherwise the image is resampled to
/// `ceil(w*scale) x ceil(h*scale)` and reduced to gray8. The full-resolution
/// intermediate drops before this returns.
pub fn prepare(source: DynamicImage, scale: f32) -> Result<PixelBuffer, PreprocessError> {
    let (width, height) = (source.width(), source.height());
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyImage);
    }

    // Fast path: no resample, no color-space conversion required.
    if scale == 1.0 && matches!(source, DynamicImage::ImageLuma8(_)) {
        debug!("preprocess fast path: {}x{} gray8 source", width, height);
        return Ok(PixelBuffer {
            data: source.into_luma8().into_raw(),
            width,
            height,
        });
    }

    let (target_w, target_h) = if scale == 1.0 {
        (width, height)
    } else {
        (
            (width as f32 * scale).ceil() as u32,
            (height as f32 * scale).ceil() as u32,
        )
    };
    if target_w == 0 || target_h == 0 {
        return Err(PreprocessError::EmptyImage);
    }

    let gray = {
        // Scope the resampled intermediate so it is released here.
        let resized = if (target_w, target_h) == (width, height) {
            source
        } else {
            source.resize_exact(target_w, target_h, FilterType::Triangle)
        };
        resized.to_luma8()
    };

    let (out_w, out_h) = gray.dimensions();
    let data = gray.into_raw();
    if data.len() != (out_w * out_h) as usize {
        return Err(PreprocessError::Unreadable(format!(
            "expected {} bytes for {}x{}, got {}",
            out_w * out_h,
            out_w,
            out_h,
            data.len()
        )));
    }

    debug!(
        "preprocessed {}x{} -> {}x{} gray8 (scale {})",
        width, height, out_w, out_h, scale
    );

    Ok(PixelBuffer {
        data,
        width: out_w,
        height: out_h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn test_zero_sized_source_rejected() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        let result = prepare(img, 1.0);
        assert!(matches!(result, Err(PreprocessError::EmptyImage)));
    }

    #[test]
    fn test_fast_path_keeps_bytes() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(0, 0, Luma([10]));
        gray.put_pixel(1, 0, Luma([20]));
        gray.put_pixel(0, 1, Luma([30]));
        gray.put_pixel(1, 1, Luma([40]));

        let buffer = prepare(DynamicImage::ImageLuma8(gray), 1.0).unwrap();
        assert_eq!(buffer.width, 2);
        assert_eq!(buffer.height, 2);
        assert_eq!(buffer.data, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_rgba_converted_to_gray() {
        // Red pixel: luminance 0.299 * 255 = 76
        let img = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        let buffer = prepare(DynamicImage::ImageRgba8(img), 1.0).unwrap();
        assert_eq!(buffer.data.len(), 9);
        assert!(buffer.data.iter().all(|&p| (70..=82).contains(&p)));
    }

    #[test]
    fn test_downscale_dimensions_rounded_up() {
        let img = RgbaImage::from_pixel(10, 5, Rgba([128, 128, 128, 255]));
        let buffer = prepare(DynamicImage::ImageRgba8(img), 0.5).unwrap();
        assert_eq!((buffer.width, buffer.height), (5, 3));
        assert_eq!(buffer.data.len(), 15);
        assert_eq!(buffer.stride(), 5);
    }

    #[test]
    fn test_gray_source_with_downscale_resamples() {
        let gray = GrayImage::from_pixel(8, 8, Luma([200]));
        let buffer = prepare(DynamicImage::ImageLuma8(gray), 0.25).unwrap();
        assert_eq!((buffer.width, buffer.height), (2, 2));
    }
}
