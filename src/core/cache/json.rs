//! JSON file cache backend.
//!
//! The file holds one object mapping `"<path>:<mtime>"` to a 16-digit hex
//! fingerprint. It is read once at startup and rewritten in full on flush.

use super::{parse_cache_key, CacheBackend, CacheStats, CachedFingerprint, EntryMap, FileStamp};
use crate::core::hasher::Fingerprint;
use crate::error::CacheError;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Default cache file name, relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = "image_hash_cache.json";

/// Cache persisted to a single JSON file
pub struct JsonFileCache {
    path: PathBuf,
    entries: EntryMap,
    /// Set by every mutation, cleared by a successful flush
    dirty: AtomicBool,
    /// Serializes flushes (periodic flushes can race a stop request)
    flush_lock: Mutex<()>,
}

impl JsonFileCache {
    /// Load the cache, degrading to an empty cache on any problem.
    ///
    /// A missing file is a cold start. An unreadable or corrupt file is
    /// logged and ignored; it is overwritten by the next flush.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(cache) => cache,
            Err(error) => {
                warn!(%error, "Ignoring unusable hash cache, starting empty");
                Self::empty(path)
            }
        }
    }

    /// Load the cache, reporting unreadable or corrupt files as errors.
    ///
    /// A missing file still yields an empty cache.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let cache = Self::empty(path.to_path_buf());

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No hash cache yet, starting cold");
                return Ok(cache);
            }
            Err(source) => {
                return Err(CacheError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&contents).map_err(|e| CacheError::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut skipped = 0usize;
        for (key, hex) in raw {
            let parsed = parse_cache_key(&key)
                .zip(Fingerprint::from_hex(&hex).ok());
            match parsed {
                Some(((file, modified), fingerprint)) => cache.entries.merge(
                    file,
                    CachedFingerprint {
                        modified,
                        fingerprint,
                    },
                ),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(path = %path.display(), skipped, "Skipped malformed cache entries");
        }
        info!(
            path = %path.display(),
            entries = cache.entries.len(),
            "Loaded hash cache"
        );

        Ok(cache)
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            entries: EntryMap::default(),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are changes not yet flushed
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Write to a temp file next to the target, then rename over it
    fn write_snapshot(&self, snapshot: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let write_failed = |reason: String| CacheError::WriteFailed {
            path: self.path.clone(),
            reason,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| write_failed(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| write_failed(e.to_string()))?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, snapshot)
                .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;
            writer.flush().map_err(|e| write_failed(e.to_string()))?;
        }

        temp.persist(&self.path)
            .map_err(|e| write_failed(e.error.to_string()))?;
        Ok(())
    }
}

impl CacheBackend for JsonFileCache {
    fn get(&self, path: &Path, current_modified: SystemTime) -> Option<Fingerprint> {
        self.entries.get(path, current_modified)
    }

    fn put(&self, path: &Path, modified: SystemTime, fingerprint: Fingerprint) {
        self.entries
            .put(path, FileStamp::from_system_time(modified), fingerprint);
        self.mark_dirty();
    }

    fn flush(&self) -> Result<(), CacheError> {
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Cleared before the snapshot so puts racing the write re-dirty it
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let snapshot = self.entries.to_persisted();
        if let Err(error) = self.write_snapshot(&snapshot) {
            self.mark_dirty();
            return Err(error);
        }

        debug!(path = %self.path.display(), entries = snapshot.len(), "Flushed hash cache");
        Ok(())
    }

    fn remove(&self, path: &Path) {
        if self.entries.remove(path) {
            self.mark_dirty();
        }
    }

    fn clear(&self) {
        self.entries.clear();
        self.mark_dirty();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            backing_file: Some(self.path.clone()),
        }
    }

    fn prune_orphans(&self) -> usize {
        let removed = self.entries.prune_missing();
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }
}
