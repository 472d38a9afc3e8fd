//! In-memory cache backend for testing.

use super::{CacheBackend, CacheStats, EntryMap, FileStamp};
use crate::core::hasher::Fingerprint;
use crate::error::CacheError;
use std::path::Path;
use std::time::SystemTime;

/// In-memory cache backend
///
/// Useful for tests and runs where nothing should be written to disk.
/// `flush` is a no-op.
#[derive(Default)]
pub struct InMemoryCache {
    entries: EntryMap,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for InMemoryCache {
    fn get(&self, path: &Path, current_modified: SystemTime) -> Option<Fingerprint> {
        self.entries.get(path, current_modified)
    }

    fn put(&self, path: &Path, modified: SystemTime, fingerprint: Fingerprint) {
        self.entries
            .put(path, FileStamp::from_system_time(modified), fingerprint);
    }

    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove(&self, path: &Path) {
        self.entries.remove(path);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            backing_file: None,
        }
    }

    fn prune_orphans(&self) -> usize {
        self.entries.prune_missing()
    }
}
