//! Fingerprint type and the hasher trait.

use super::fast_decode::FastDecoder;
use crate::error::HashError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A 64-bit perceptual fingerprint.
///
/// Equality is exact; similarity is the Hamming distance between two
/// fingerprints. Values are immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Number of bits in a fingerprint
    pub const BITS: u32 = 64;

    /// Wrap raw fingerprint bits
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Build from big-endian hash bytes. Returns `None` unless exactly 8 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(array)))
    }

    /// Raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Hamming distance: number of differing bits
    pub fn distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Similarity as a percentage (0-100)
    pub fn similarity(self, other: Self) -> f64 {
        (1.0 - self.distance(other) as f64 / Self::BITS as f64) * 100.0
    }

    /// Lowercase, zero-padded 16-digit hex
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }

    /// Parse the 16-digit hex form written by [`Fingerprint::to_hex`]
    pub fn from_hex(value: &str) -> Result<Self, HashError> {
        let invalid = || HashError::InvalidFingerprint {
            value: value.to_string(),
        };
        if value.len() != 16 {
            return Err(invalid());
        }
        u64::from_str_radix(value, 16).map(Self).map_err(|_| invalid())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Computes fingerprints from image content.
///
/// Implementations must be deterministic: identical pixels always
/// produce the identical fingerprint.
pub trait ImageHasher: Send + Sync {
    /// Fingerprint an already-decoded image
    fn hash_image(&self, image: &DynamicImage) -> Result<Fingerprint, HashError>;

    /// Decode a file and fingerprint it.
    ///
    /// JPEGs go through zune-jpeg, PNGs through the image crate.
    fn hash_file(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let image = FastDecoder::decode(path)?;
        self.hash_image(&image)
    }
}
