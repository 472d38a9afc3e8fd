//! # Scheduler Module
//!
//! Drives a whole run: enumerate, fingerprint, match, publish.
//!
//! ## Flow
//! 1. **Scan** - list images under the root (trash folder excluded only
//!    when `exclude_trash` is set)
//! 2. **Batch** - split the list into contiguous batches
//! 3. **Process** - each batch is fingerprinted on a rayon pool, the cache
//!    consulted before the hasher; the fingerprints are then matched
//!    against the index in enumeration order under one lock
//! 4. **Publish** - matches go to the duplicate stream and to listeners
//!
//! Between batches the thread count and batch size are re-read from the
//! adaptive throttle. A stop request lets the running batch drain and
//! starts no new one. Whatever happens, the cache is flushed and the
//! stream sentinel published at the end.
//!
//! ## Example
//! ```rust,ignore
//! let config = FinderConfig::builder("/photos").trash_folder("/photos/trash").build()?;
//! let finder = DuplicateFinder::builder(config).build();
//! let stream = finder.duplicates();
//! let handle = finder.start()?;
//!
//! loop {
//!     match stream.poll() {
//!         Next::Pair(pair) => println!("{} ~ {}", pair.path.display(), pair.representative.display()),
//!         Next::Pending => std::thread::sleep(Duration::from_millis(50)),
//!         Next::Finished => break,
//!     }
//! }
//! let summary = handle.join().map_err(|_| DuplicateFinderError::WorkerPanicked)??;
//! ```

mod executor;
mod throttle;

pub use executor::{DuplicateFinder, DuplicateFinderBuilder, RunSummary, PROGRESS_INTERVAL};
pub use throttle::{
    AdaptiveThrottle, ResourceMonitor, ResourceSample, SystemResourceMonitor, Tuning,
    MAX_BATCH_SIZE, MAX_THREADS, MIN_BATCH_SIZE, MIN_THREADS,
};
