//! # Hasher Module
//!
//! Computes perceptual fingerprints for images.
//!
//! ## How It Works
//! 1. Decode the file (zune-jpeg for JPEG, image crate for PNG)
//! 2. Convert to grayscale and shrink to at most 500x500
//! 3. Run a DCT and keep the 8x8 lowest frequencies
//! 4. Set one bit per coefficient above the median
//!
//! Fingerprints are compared with Hamming distance.
//!
//! ## Example
//! ```rust,ignore
//! use duplicate_image_finder::core::hasher::{ImageHasher, PerceptualHasher};
//!
//! let hasher = PerceptualHasher::new();
//! let fingerprint = hasher.hash_file(&path)?;
//! println!("{}", fingerprint.to_hex());
//! ```

pub mod fast_decode;
pub mod fast_resize;
pub mod mmap_decode;
mod perceptual;
mod traits;

pub use perceptual::{PerceptualHasher, MAX_HASH_DIMENSION};
pub use traits::{Fingerprint, ImageHasher};
