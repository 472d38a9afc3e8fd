//! # Core Module
//!
//! The UI-agnostic duplicate detection engine.
//!
//! ## Modules
//! - `scanner` - Discovers images in directories
//! - `hasher` - Computes perceptual fingerprints
//! - `index` - Matches fingerprints against earlier images
//! - `cache` - Persists fingerprints to avoid recomputation
//! - `scheduler` - Orchestrates a run in adaptive batches

pub mod cache;
pub mod hasher;
pub mod index;
pub mod scanner;
pub mod scheduler;

// Re-export commonly used types
pub use hasher::{Fingerprint, ImageHasher};
pub use index::{MatchType, NearDuplicateIndex};
pub use scanner::ImageFile;
pub use scheduler::{DuplicateFinder, RunSummary};
