//! Cache backend trait definition.

use super::CacheStats;
use crate::core::hasher::Fingerprint;
use crate::error::CacheError;
use std::path::Path;
use std::time::SystemTime;

/// Trait for fingerprint caches.
///
/// Implementations are shared by every worker, so all methods take `&self`
/// and guard their state internally.
pub trait CacheBackend: Send + Sync {
    /// Get a cached fingerprint if one was stored for exactly this mtime
    fn get(&self, path: &Path, current_modified: SystemTime) -> Option<Fingerprint>;

    /// Record (or overwrite) the fingerprint for a file at the given mtime
    fn put(&self, path: &Path, modified: SystemTime, fingerprint: Fingerprint);

    /// Persist the whole cache.
    ///
    /// Called periodically and at the end of a run, never per update.
    fn flush(&self) -> Result<(), CacheError>;

    /// Remove a specific entry
    fn remove(&self, path: &Path);

    /// Clear all cached entries
    fn clear(&self);

    /// Get cache statistics
    fn stats(&self) -> CacheStats;

    /// Remove entries for files that no longer exist
    ///
    /// Returns the number of entries removed.
    fn prune_orphans(&self) -> usize;
}
