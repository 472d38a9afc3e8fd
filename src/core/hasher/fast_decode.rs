//! Image decoding for the supported formats.
//!
//! JPEGs are decoded with zune-jpeg (1.5-2x faster than the image crate)
//! and fall back to the image crate when zune rejects a file. PNGs go
//! straight to the image crate.

use super::mmap_decode::read_file_bytes;
use crate::core::scanner::ImageFormat;
use crate::error::HashError;
use image::{DynamicImage, ImageBuffer, Pixel};
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Decoder that dispatches on the file extension
pub struct FastDecoder;

impl FastDecoder {
    /// Decode an image file.
    ///
    /// Fails with [`HashError::UnsupportedFormat`] for anything that is not
    /// a PNG or JPEG, and with [`HashError::DecodeError`] for corrupt files.
    pub fn decode(path: &Path) -> Result<DynamicImage, HashError> {
        let format = ImageFormat::from_path(path).ok_or_else(|| HashError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;

        let bytes = read_file_bytes(path)?;

        match format {
            ImageFormat::Jpeg => Self::decode_jpeg(path, &bytes)
                .or_else(|_| Self::decode_with_image(path, &bytes, image::ImageFormat::Jpeg)),
            ImageFormat::Png => Self::decode_with_image(path, &bytes, image::ImageFormat::Png),
        }
    }

    fn decode_jpeg(path: &Path, bytes: &[u8]) -> Result<DynamicImage, HashError> {
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder.decode().map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: "missing JPEG frame header".to_string(),
        })?;
        let (width, height) = (info.width as u32, info.height as u32);

        match decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB) {
            ColorSpace::RGB => wrap_pixels(path, width, height, pixels).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => {
                wrap_pixels(path, width, height, pixels).map(DynamicImage::ImageRgba8)
            }
            ColorSpace::Luma => {
                wrap_pixels(path, width, height, pixels).map(DynamicImage::ImageLuma8)
            }
            other => Err(HashError::DecodeError {
                path: path.to_path_buf(),
                reason: format!("unexpected output colorspace {:?}", other),
            }),
        }
    }

    fn decode_with_image(
        path: &Path,
        bytes: &[u8],
        format: image::ImageFormat,
    ) -> Result<DynamicImage, HashError> {
        image::load_from_memory_with_format(bytes, format).map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn wrap_pixels<P: Pixel<Subpixel = u8>>(
    path: &Path,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
) -> Result<ImageBuffer<P, Vec<u8>>, HashError> {
    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| HashError::DecodeError {
        path: path.to_path_buf(),
        reason: format!("pixel buffer does not match {}x{}", width, height),
    })
}
