//! Perceptual Hash (pHash) implementation.
//!
//! The image is reduced to grayscale inside a 500x500 bound, transformed
//! with a DCT, and the 8x8 block of lowest-frequency coefficients is
//! compared against its median to produce 64 bits. This makes the
//! fingerprint robust to:
//! - Scaling
//! - Re-encoding and compression artifacts
//! - Brightness/contrast changes

use super::fast_resize::downscale_to_grayscale;
use super::traits::{Fingerprint, ImageHasher};
use crate::error::HashError;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use std::path::Path;

/// Longest side an image is reduced to before hashing
pub const MAX_HASH_DIMENSION: u32 = 500;

/// DCT-based perceptual hasher producing 64-bit fingerprints
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
    max_dimension: u32,
}

impl PerceptualHasher {
    pub fn new() -> Self {
        Self::with_max_dimension(MAX_HASH_DIMENSION)
    }

    /// Use a different pre-hash bound (mainly for benchmarks)
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();

        Self {
            hasher,
            max_dimension: max_dimension.max(1),
        }
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageHasher for PerceptualHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<Fingerprint, HashError> {
        let bounded = downscale_to_grayscale(image, self.max_dimension)?;
        let hash = self.hasher.hash_image(&DynamicImage::ImageLuma8(bounded));

        Fingerprint::from_bytes(hash.as_bytes()).ok_or_else(|| {
            HashError::ComputationFailed(format!(
                "expected a 64-bit hash, got {} bytes",
                hash.as_bytes().len()
            ))
        })
    }

    fn hash_file(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let image = super::fast_decode::FastDecoder::decode(path)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        self.hash_image(&image).map_err(|e| match e {
            HashError::ComputationFailed(reason) => HashError::DecodeError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }
}
