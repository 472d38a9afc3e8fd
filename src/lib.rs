//! # Duplicate Image Finder
//!
//! Finds near-duplicate images in a directory tree by perceptual hash.
//!
//! ## Core Philosophy
//! - **Never auto-delete** - the engine reports pairs; what happens to them
//!   is up to the caller
//! - **Incremental** - each image is compared against the representatives
//!   seen so far, and pairs stream out while the scan is still running
//! - **Cheap reruns** - fingerprints are cached by path and mtime
//!
//! ## Architecture
//! - `core` - The duplicate detection engine
//! - `events` - Listeners and the duplicate stream
//! - `config` - Run configuration and the TOML loader
//! - `error` - Error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::FinderConfig;
pub use core::scheduler::{DuplicateFinder, RunSummary};
pub use error::{DuplicateFinderError, Result};
pub use events::{DuplicatePair, DuplicateStream, Event, EventListener, Next};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the library
///
/// Called by the application entry point. `RUST_LOG` wins unless `verbose`
/// is set, which forces debug output. Logs go to stderr so stdout stays
/// clean for results. Calling it twice is harmless.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
