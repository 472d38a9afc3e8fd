//! # Cache Module
//!
//! Persists fingerprints so unchanged images are not rehashed across runs.
//!
//! ## Invalidation
//! Entries are keyed by `(path, modification time)`. A file whose mtime no
//! longer matches its entry is a cache miss and gets rehashed.
//!
//! ## Backends
//! - `JsonFileCache` - `"<path>:<mtime>" -> "<hex>"` in a single JSON file
//! - `InMemoryCache` - For testing and `--no-cache` runs

mod json;
mod memory;
mod traits;

pub use json::{JsonFileCache, DEFAULT_CACHE_FILE};
pub use memory::InMemoryCache;
pub use traits::CacheBackend;

use crate::core::hasher::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// A file modification time with nanosecond precision.
///
/// Written as `<seconds>.<nanoseconds>` (nine digits) so it survives a
/// round trip through the cache file without loss. Times before the Unix
/// epoch collapse to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileStamp {
    secs: u64,
    nanos: u32,
}

impl FileStamp {
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Self {
            secs: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        }
    }

    pub fn to_system_time(self) -> SystemTime {
        UNIX_EPOCH + Duration::new(self.secs, self.nanos)
    }
}

impl From<SystemTime> for FileStamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for FileStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

impl FromStr for FileStamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (secs, nanos) = s.split_once('.').unwrap_or((s, "0"));
        let secs = secs
            .parse::<u64>()
            .map_err(|e| format!("bad seconds in {:?}: {}", s, e))?;
        if nanos.is_empty() || nanos.len() > 9 || !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("bad fraction in {:?}", s));
        }
        // "5" after the dot means 500000000ns
        let nanos = format!("{:0<9}", nanos)
            .parse::<u32>()
            .map_err(|e| format!("bad fraction in {:?}: {}", s, e))?;
        Ok(Self { secs, nanos })
    }
}

/// A fingerprint together with the mtime it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedFingerprint {
    pub modified: FileStamp,
    pub fingerprint: Fingerprint,
}

impl CachedFingerprint {
    /// Valid only while the file's mtime is unchanged
    pub fn is_valid_for(&self, current_modified: SystemTime) -> bool {
        self.modified == FileStamp::from_system_time(current_modified)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// File the cache persists to, if any
    pub backing_file: Option<PathBuf>,
}

/// Build the persisted key for an entry.
///
/// `None` for paths that are not valid UTF-8: a lossy key would load back
/// as a different path.
pub fn cache_key(path: &Path, modified: FileStamp) -> Option<String> {
    let path = path.to_str()?;
    Some(format!("{path}:{modified}"))
}

/// Split a persisted key back into path and mtime.
///
/// The split is on the last `:` so paths containing colons survive.
pub fn parse_cache_key(key: &str) -> Option<(PathBuf, FileStamp)> {
    let (path, stamp) = key.rsplit_once(':')?;
    if path.is_empty() {
        return None;
    }
    Some((PathBuf::from(path), stamp.parse().ok()?))
}

/// Lock-guarded path -> fingerprint map shared by the backends.
///
/// One entry per path: recording a new mtime replaces the old one.
#[derive(Default)]
pub(crate) struct EntryMap {
    entries: RwLock<HashMap<PathBuf, CachedFingerprint>>,
}

impl EntryMap {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, CachedFingerprint>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, CachedFingerprint>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self, path: &Path, current_modified: SystemTime) -> Option<Fingerprint> {
        self.read()
            .get(path)
            .filter(|entry| entry.is_valid_for(current_modified))
            .map(|entry| entry.fingerprint)
    }

    pub(crate) fn put(&self, path: &Path, modified: FileStamp, fingerprint: Fingerprint) {
        self.write().insert(
            path.to_path_buf(),
            CachedFingerprint {
                modified,
                fingerprint,
            },
        );
    }

    /// Insert while loading: keep the newest mtime when a path appears twice.
    pub(crate) fn merge(&self, path: PathBuf, entry: CachedFingerprint) {
        let mut entries = self.write();
        match entries.get(&path) {
            Some(existing) if existing.modified >= entry.modified => {}
            _ => {
                entries.insert(path, entry);
            }
        }
    }

    pub(crate) fn remove(&self, path: &Path) -> bool {
        self.write().remove(path).is_some()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.write();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn prune_missing(&self) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|path, _| path.exists());
        before - entries.len()
    }

    /// Snapshot in the on-disk shape, sorted for stable output.
    /// Entries whose path has no UTF-8 form stay in memory only.
    pub(crate) fn to_persisted(&self) -> BTreeMap<String, String> {
        self.read()
            .iter()
            .filter_map(|(path, entry)| match cache_key(path, entry.modified) {
                Some(key) => Some((key, entry.fingerprint.to_hex())),
                None => {
                    debug!(path = %path.display(), "Not persisting non-UTF-8 path");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_round_trips_with_nanoseconds() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let stamp = FileStamp::from_system_time(time);

        assert_eq!(stamp.to_string(), "1700000000.123456789");
        assert_eq!("1700000000.123456789".parse::<FileStamp>().unwrap(), stamp);
        assert_eq!(stamp.to_system_time(), time);
    }

    #[test]
    fn stamp_accepts_short_fraction_and_whole_seconds() {
        let half = "12.5".parse::<FileStamp>().unwrap();
        assert_eq!(half.to_system_time(), UNIX_EPOCH + Duration::from_millis(12_500));

        let whole = "12".parse::<FileStamp>().unwrap();
        assert_eq!(whole.to_system_time(), UNIX_EPOCH + Duration::from_secs(12));
    }

    #[test]
    fn stamp_rejects_garbage() {
        assert!("abc".parse::<FileStamp>().is_err());
        assert!("12.".parse::<FileStamp>().is_err());
        assert!("12.x5".parse::<FileStamp>().is_err());
    }

    #[test]
    fn cache_key_round_trips_paths_with_colons() {
        let path = Path::new("C:/photos/12:30 lunch.jpg");
        let stamp = FileStamp::from_system_time(UNIX_EPOCH + Duration::from_secs(42));

        let key = cache_key(path, stamp).unwrap();
        assert_eq!(key, "C:/photos/12:30 lunch.jpg:42.000000000");
        assert_eq!(parse_cache_key(&key), Some((path.to_path_buf(), stamp)));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_are_not_persisted() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let map = EntryMap::default();
        let stamp = FileStamp::from_system_time(UNIX_EPOCH + Duration::from_secs(7));
        let raw = Path::new(OsStr::from_bytes(b"/photos/\xff\xfe.png"));
        let lossy = PathBuf::from(raw.to_string_lossy().into_owned());
        map.put(raw, stamp, Fingerprint::new(1));
        map.put(Path::new("/photos/ok.png"), stamp, Fingerprint::new(2));

        assert_eq!(cache_key(raw, stamp), None);

        let persisted = map.to_persisted();
        assert_eq!(persisted.len(), 1);
        assert!(persisted.contains_key("/photos/ok.png:7.000000000"));
        assert!(persisted
            .keys()
            .filter_map(|key| parse_cache_key(key))
            .all(|(path, _)| path != lossy));
        // Still served from memory for the current run
        assert_eq!(map.get(raw, stamp.to_system_time()), Some(Fingerprint::new(1)));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(parse_cache_key("no-separator"), None);
        assert_eq!(parse_cache_key(":12.0"), None);
        assert_eq!(parse_cache_key("/a.png:yesterday"), None);
    }

    #[test]
    fn entry_invalid_when_modified() {
        let now = SystemTime::now();
        let entry = CachedFingerprint {
            modified: FileStamp::from_system_time(now),
            fingerprint: Fingerprint::new(1),
        };

        assert!(entry.is_valid_for(now));
        assert!(!entry.is_valid_for(now + Duration::from_secs(60)));
    }

    #[test]
    fn merge_keeps_newest_stamp() {
        let map = EntryMap::default();
        let path = PathBuf::from("/a.png");
        let older = CachedFingerprint {
            modified: "10.0".parse().unwrap(),
            fingerprint: Fingerprint::new(1),
        };
        let newer = CachedFingerprint {
            modified: "20.0".parse().unwrap(),
            fingerprint: Fingerprint::new(2),
        };

        map.merge(path.clone(), newer);
        map.merge(path.clone(), older);

        assert_eq!(map.get(&path, newer.modified.to_system_time()), Some(Fingerprint::new(2)));
        assert_eq!(map.len(), 1);
    }
}
