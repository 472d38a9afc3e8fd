//! Bounded grayscale downscaling.
//!
//! Every image is reduced to at most `max_dimension` on its longest side
//! before the DCT, so hashing cost does not depend on source resolution.
//! Uses fast_image_resize (AVX2/NEON when available).

use crate::error::HashError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage, ImageBuffer};

/// Target size that fits `width`x`height` inside a `max_dimension` square,
/// keeping the aspect ratio. Never upscales.
pub fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let shrink = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    (shrink(width), shrink(height))
}

/// Convert to grayscale and shrink to fit inside `max_dimension`.
pub fn downscale_to_grayscale(
    image: &DynamicImage,
    max_dimension: u32,
) -> Result<GrayImage, HashError> {
    let gray = image.to_luma8();
    let (src_width, src_height) = gray.dimensions();

    if src_width == 0 || src_height == 0 {
        return Err(HashError::ComputationFailed(
            "image has zero width or height".to_string(),
        ));
    }

    let (width, height) = bounded_dimensions(src_width, src_height, max_dimension);
    if (width, height) == (src_width, src_height) {
        return Ok(gray);
    }

    let src_image = Image::from_vec_u8(src_width, src_height, gray.into_raw(), PixelType::U8)
        .map_err(|e| HashError::ComputationFailed(format!("invalid source buffer: {}", e)))?;
    let mut dst_image = Image::new(width, height, PixelType::U8);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| HashError::ComputationFailed(format!("resize failed: {}", e)))?;

    ImageBuffer::from_raw(width, height, dst_image.into_vec()).ok_or_else(|| {
        HashError::ComputationFailed("resized buffer has the wrong length".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn small_images_keep_their_size() {
        assert_eq!(bounded_dimensions(320, 200, 500), (320, 200));
        assert_eq!(bounded_dimensions(500, 500, 500), (500, 500));
    }

    #[test]
    fn large_images_fit_the_bound() {
        assert_eq!(bounded_dimensions(2000, 1000, 500), (500, 250));
        assert_eq!(bounded_dimensions(900, 3000, 500), (150, 500));
    }

    #[test]
    fn extreme_aspect_ratio_keeps_one_pixel() {
        assert_eq!(bounded_dimensions(10_000, 3, 500), (500, 1));
    }

    #[test]
    fn downscale_produces_bounded_grayscale() {
        let image = create_test_image(1200, 800);
        let gray = downscale_to_grayscale(&image, 500).unwrap();
        assert_eq!(gray.dimensions(), (500, 333));
    }

    #[test]
    fn downscale_leaves_small_image_untouched() {
        let image = create_test_image(64, 32);
        let gray = downscale_to_grayscale(&image, 500).unwrap();
        assert_eq!(gray.dimensions(), (64, 32));
        assert_eq!(gray.as_raw(), image.to_luma8().as_raw());
    }
}
