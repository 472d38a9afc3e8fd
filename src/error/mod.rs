//! # Error Module
//!
//! One enum per concern, folded into `DuplicateFinderError`.
//!
//! Only scan and setup errors end a run. `HashError` and `CacheError` are
//! logged by the scheduler and the run carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DuplicateFinderError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build worker pool with {threads} threads: {reason}")]
    WorkerPool { threads: usize, reason: String },

    #[error("Failed to spawn background thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("This finder has already been started; create a new one for another run")]
    AlreadyStarted,

    #[error("Processing thread panicked")]
    WorkerPanicked,
}

/// Errors that occur while enumerating images
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors that occur while fingerprinting a single image.
///
/// Every variant is treated as a per-file skip by the scheduler.
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported image format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Invalid fingerprint {value:?}: expected 16 hex digits")]
    InvalidFingerprint { value: String },

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur with the persisted hash cache.
///
/// None of these abort a run: a bad cache file on load degrades to an
/// empty cache and a failed flush is logged.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache corruption detected at {path}: {reason}. Delete this file and try again.")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Failed to write cache file {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Failed to serialize hash data: {0}")]
    SerializationFailed(String),
}

/// Errors that occur while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DuplicateFinderError>;
