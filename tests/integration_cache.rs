use assert_fs::prelude::*;
use duplicate_image_finder::core::cache::{CacheBackend, JsonFileCache};
use duplicate_image_finder::core::hasher::Fingerprint;
use predicates::prelude::*;
use std::fs;
use std::time::{Duration, UNIX_EPOCH};

#[test]
fn cache_file_is_written_on_flush_and_readable_by_key() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cache_file = temp.child("image_hash_cache.json");
    let image = temp.child("a.png");
    image.touch().unwrap();

    let modified = fs::metadata(image.path()).unwrap().modified().unwrap();
    let cache = JsonFileCache::load(cache_file.path());
    cache.put(image.path(), modified, Fingerprint::new(0x0123_4567_89AB_CDEF));

    cache_file.assert(predicate::path::missing());
    cache.flush().unwrap();

    cache_file.assert(predicate::path::is_file());
    cache_file.assert(predicate::str::contains("0123456789abcdef"));
    cache_file.assert(predicate::str::contains(image.path().to_string_lossy().as_ref()));

    let reloaded = JsonFileCache::open(cache_file.path()).unwrap();
    assert_eq!(
        reloaded.get(image.path(), modified),
        Some(Fingerprint::new(0x0123_4567_89AB_CDEF))
    );

    temp.close().unwrap();
}

#[test]
fn prune_drops_entries_for_deleted_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cache_file = temp.child("cache.json");
    let kept = temp.child("kept.png");
    let deleted = temp.child("deleted.png");
    kept.touch().unwrap();
    deleted.touch().unwrap();

    let stamp = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let cache = JsonFileCache::load(cache_file.path());
    cache.put(kept.path(), stamp, Fingerprint::new(1));
    cache.put(deleted.path(), stamp, Fingerprint::new(2));
    cache.flush().unwrap();

    fs::remove_file(deleted.path()).unwrap();

    let cache = JsonFileCache::load(cache_file.path());
    assert_eq!(cache.prune_orphans(), 1);
    cache.flush().unwrap();

    cache_file.assert(predicate::str::contains("kept.png"));
    cache_file.assert(predicate::str::contains("deleted.png").not());
    assert_eq!(JsonFileCache::open(cache_file.path()).unwrap().stats().total_entries, 1);
}

#[test]
fn clear_leaves_an_empty_object() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cache_file = temp.child("cache.json");

    let cache = JsonFileCache::load(cache_file.path());
    cache.put(temp.path().join("a.png").as_path(), UNIX_EPOCH, Fingerprint::new(7));
    cache.flush().unwrap();
    cache.clear();
    cache.flush().unwrap();

    cache_file.assert(predicate::str::is_match(r"^\{\s*\}\s*$").unwrap());
}

#[test]
fn corrupt_cache_is_replaced_by_next_flush() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cache_file = temp.child("cache.json");
    cache_file.write_str("[1, 2, 3").unwrap();

    assert!(JsonFileCache::open(cache_file.path()).is_err());

    let cache = JsonFileCache::load(cache_file.path());
    assert_eq!(cache.stats().total_entries, 0);
    cache.put(temp.path().join("b.png").as_path(), UNIX_EPOCH, Fingerprint::new(3));
    cache.flush().unwrap();

    cache_file.assert(predicate::str::contains("0000000000000003"));
    assert_eq!(JsonFileCache::open(cache_file.path()).unwrap().stats().total_entries, 1);
}

#[test]
fn stats_report_backing_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cache_file = temp.child("nested/cache.json");

    let cache = JsonFileCache::load(cache_file.path());
    let stats = cache.stats();

    assert_eq!(stats.total_entries, 0);
    assert_eq!(stats.backing_file.as_deref(), Some(cache_file.path()));
}
