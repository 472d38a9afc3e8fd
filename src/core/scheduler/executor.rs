//! Finder execution implementation.

use super::throttle::{AdaptiveThrottle, ResourceMonitor, SystemResourceMonitor, Tuning};
use crate::config::FinderConfig;
use crate::core::cache::{CacheBackend, JsonFileCache};
use crate::core::hasher::{Fingerprint, ImageHasher, PerceptualHasher};
use crate::core::index::{IndexOutcome, NearDuplicateIndex};
use crate::core::scanner::{ImageFile, ScanConfig, WalkDirScanner};
use crate::error::{DuplicateFinderError, HashError, Result, ScanError};
use crate::events::{DuplicatePair, DuplicateStream, EventListener, EventNotifier};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Processed files between mid-batch progress events
pub const PROGRESS_INTERVAL: usize = 100;

/// Outcome of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Images enumerated
    pub total_files: usize,
    /// Images that went through the per-file unit, including failures
    pub processed: usize,
    /// Fingerprints computed by the hasher
    pub hashed: usize,
    /// Fingerprints served from the cache
    pub cache_hits: usize,
    /// Pairs published
    pub duplicates: usize,
    /// Images that became representatives
    pub representatives: usize,
    /// Images skipped because they could not be fingerprinted
    pub failures: usize,
    /// Stopped before every batch ran
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Outcome of the parallel half of the per-file unit
enum Fingerprinted {
    /// Cancelled or over the image cap; not counted
    Skipped,
    /// Could not be fingerprinted; counted as processed
    Failed,
    Ready(Fingerprint),
}

/// Index and counters guarded together
struct MatchState {
    index: NearDuplicateIndex,
    processed: usize,
    duplicates: usize,
}

struct FinderShared {
    config: FinderConfig,
    cache: Arc<dyn CacheBackend>,
    hasher: Arc<dyn ImageHasher>,
    /// Taken by the run that starts the throttle
    monitor: Mutex<Option<Box<dyn ResourceMonitor>>>,
    notifier: EventNotifier,
    stream: DuplicateStream,
    state: Mutex<MatchState>,
    total: AtomicUsize,
    /// Files admitted to the per-file unit, for the image cap
    admitted: AtomicUsize,
    hashed: AtomicUsize,
    cache_hits: AtomicUsize,
    failures: AtomicUsize,
    started: AtomicBool,
    cancelled: AtomicBool,
    complete: AtomicBool,
}

/// Builder for `DuplicateFinder`
pub struct DuplicateFinderBuilder {
    config: FinderConfig,
    cache: Option<Arc<dyn CacheBackend>>,
    hasher: Option<Arc<dyn ImageHasher>>,
    monitor: Option<Box<dyn ResourceMonitor>>,
}

impl DuplicateFinderBuilder {
    pub fn new(config: FinderConfig) -> Self {
        Self {
            config,
            cache: None,
            hasher: None,
            monitor: None,
        }
    }

    /// Set the cache backend (default: `JsonFileCache` at the configured path)
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the hasher (default: `PerceptualHasher`)
    pub fn hasher(mut self, hasher: Arc<dyn ImageHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Set the load source for adaptive tuning (default: sysinfo)
    pub fn resource_monitor(mut self, monitor: Box<dyn ResourceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn build(self) -> DuplicateFinder {
        let config = self.config;
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(JsonFileCache::load(config.cache_path())));
        let hasher = self
            .hasher
            .unwrap_or_else(|| Arc::new(PerceptualHasher::new()));
        let index = NearDuplicateIndex::new(config.similarity_threshold());

        DuplicateFinder {
            inner: Arc::new(FinderShared {
                config,
                cache,
                hasher,
                monitor: Mutex::new(self.monitor),
                notifier: EventNotifier::new(),
                stream: DuplicateStream::new(),
                state: Mutex::new(MatchState {
                    index,
                    processed: 0,
                    duplicates: 0,
                }),
                total: AtomicUsize::new(0),
                admitted: AtomicUsize::new(0),
                hashed: AtomicUsize::new(0),
                cache_hits: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
                started: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                complete: AtomicBool::new(false),
            }),
        }
    }
}

/// The duplicate image finder.
///
/// Cheap to clone; clones share one run. A finder runs once.
#[derive(Clone)]
pub struct DuplicateFinder {
    inner: Arc<FinderShared>,
}

impl DuplicateFinder {
    pub fn builder(config: FinderConfig) -> DuplicateFinderBuilder {
        DuplicateFinderBuilder::new(config)
    }

    /// Finder with default settings for the given folders
    pub fn new(
        image_folder: impl Into<PathBuf>,
        trash_folder: impl Into<PathBuf>,
        similarity_threshold: u32,
    ) -> Result<Self> {
        let config = FinderConfig::builder(image_folder)
            .trash_folder(trash_folder)
            .similarity_threshold(similarity_threshold)
            .build()?;
        Ok(Self::builder(config).build())
    }

    pub fn config(&self) -> &FinderConfig {
        &self.inner.config
    }

    /// Register a listener for progress, duplicate and completion events
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.inner.notifier.subscribe(listener);
    }

    /// Handle to the stream of duplicate pairs
    pub fn duplicates(&self) -> DuplicateStream {
        self.inner.stream.clone()
    }

    /// Run on a background thread
    pub fn start(&self) -> Result<JoinHandle<Result<RunSummary>>> {
        self.claim_run()?;

        let finder = self.clone();
        thread::Builder::new()
            .name("duplicate-finder".to_string())
            .spawn(move || finder.execute())
            .map_err(|e| {
                self.inner.finish(false);
                DuplicateFinderError::Spawn(e)
            })
    }

    /// Run on the calling thread until done or stopped
    pub fn run(&self) -> Result<RunSummary> {
        self.claim_run()?;
        self.execute()
    }

    /// Request cancellation.
    ///
    /// The running batch drains and no further batch starts. The first call
    /// also flushes the cache. Safe to call any number of times from any
    /// thread.
    pub fn stop(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Stop requested");
        self.inner.flush_cache();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Whether the run is over (finished, stopped or failed)
    pub fn is_processing_complete(&self) -> bool {
        self.inner.complete.load(Ordering::Acquire)
    }

    /// Percentage of enumerated files processed, 0.0 to 100.0
    pub fn progress(&self) -> f64 {
        self.inner.progress()
    }

    /// Pairs published but not yet drained from the stream
    pub fn pending_count(&self) -> usize {
        self.inner.stream.pending()
    }

    pub fn trash_folder(&self) -> Option<&Path> {
        self.inner.config.trash_folder()
    }

    fn claim_run(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(DuplicateFinderError::AlreadyStarted);
        }
        Ok(())
    }

    fn execute(&self) -> Result<RunSummary> {
        let started_at = Instant::now();
        let inner = &self.inner;

        info!(
            root = %inner.config.image_folder().display(),
            threshold = inner.config.similarity_threshold(),
            "Starting duplicate search"
        );

        let outcome = inner.process();
        let cancelled = inner.cancelled.load(Ordering::Acquire);
        inner.finish(cancelled);

        outcome?;

        let state = inner.lock_state();
        let summary = RunSummary {
            total_files: inner.total.load(Ordering::Acquire),
            processed: state.processed,
            hashed: inner.hashed.load(Ordering::Acquire),
            cache_hits: inner.cache_hits.load(Ordering::Acquire),
            duplicates: state.duplicates,
            representatives: state.index.len(),
            failures: inner.failures.load(Ordering::Acquire),
            cancelled,
            duration_ms: started_at.elapsed().as_millis() as u64,
        };
        drop(state);

        info!(
            files = summary.total_files,
            processed = summary.processed,
            duplicates = summary.duplicates,
            cache_hits = summary.cache_hits,
            failures = summary.failures,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms,
            "Duplicate search finished"
        );
        Ok(summary)
    }
}

impl FinderShared {
    fn lock_state(&self) -> MutexGuard<'_, MatchState> {
        // A panic while holding the lock leaves the index consistent enough
        // to keep going; every mutation is a single push or increment
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn process(&self) -> Result<()> {
        let files = match self.enumerate() {
            Ok(files) => files,
            Err(ScanError::Cancelled) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        self.total.store(files.len(), Ordering::Release);

        if files.is_empty() {
            info!("No images found");
            return Ok(());
        }

        let mut throttle = self.throttle();
        let mut pool: Option<(usize, ThreadPool)> = None;
        let mut next = 0;
        let mut batch_number = 0;

        while next < files.len() {
            if self.is_cancelled() {
                info!(remaining = files.len() - next, "Stopping before next batch");
                break;
            }

            let tuning = throttle.current();
            let workers = match pool.take() {
                Some((threads, workers)) if threads == tuning.num_threads => workers,
                _ => build_pool(tuning.num_threads)?,
            };

            let end = next.saturating_add(tuning.batch_size).min(files.len());
            let batch = &files[next..end];
            batch_number += 1;
            debug!(
                batch = batch_number,
                files = batch.len(),
                threads = tuning.num_threads,
                "Processing batch"
            );

            // Hash in parallel, match in enumeration order
            let fingerprints: Vec<Fingerprinted> = workers.install(|| {
                batch
                    .par_iter()
                    .map(|file| self.fingerprint_file(&file.path))
                    .collect()
            });
            for (file, fingerprinted) in batch.iter().zip(fingerprints) {
                self.record(&file.path, fingerprinted);
            }

            pool = Some((tuning.num_threads, workers));
            next = end;
            self.report_progress();
        }

        throttle.shutdown();
        Ok(())
    }

    fn enumerate(&self) -> std::result::Result<Vec<ImageFile>, ScanError> {
        let config = &self.config;
        let scanner = WalkDirScanner::new(ScanConfig {
            follow_symlinks: config.follow_symlinks(),
            include_hidden: config.include_hidden(),
            max_depth: None,
            max_images: Some(config.max_images()),
            exclude: config
                .trash_folder()
                .filter(|_| config.exclude_trash())
                .map(Path::to_path_buf)
                .into_iter()
                .collect(),
        });

        let result = scanner.scan_until(config.image_folder(), &self.cancelled)?;
        if result.truncated {
            warn!(
                max_images = config.max_images(),
                "Image limit reached, remaining files are ignored"
            );
        }
        Ok(result.files)
    }

    fn throttle(&self) -> AdaptiveThrottle {
        let config = &self.config;
        let initial = Tuning::new(config.num_threads(), config.batch_size());
        if !config.adaptive() {
            return AdaptiveThrottle::fixed(initial);
        }

        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| Box::new(SystemResourceMonitor::new()));

        AdaptiveThrottle::spawn(
            monitor,
            initial,
            config.high_resource_threshold(),
            config.resource_check_interval(),
        )
        .unwrap_or_else(|error| {
            warn!(%error, "Resource monitor unavailable, using fixed tuning");
            AdaptiveThrottle::fixed(initial)
        })
    }

    /// Parallel half of the per-file unit. Never fails; problems are
    /// logged and counted.
    fn fingerprint_file(&self, path: &Path) -> Fingerprinted {
        if self.is_cancelled() {
            return Fingerprinted::Skipped;
        }
        if self.admitted.fetch_add(1, Ordering::AcqRel) >= self.config.max_images() {
            return Fingerprinted::Skipped;
        }

        match catch_unwind(AssertUnwindSafe(|| self.fingerprint_for(path))) {
            Ok(Ok(fingerprint)) => Fingerprinted::Ready(fingerprint),
            Ok(Err(error)) => {
                warn!(path = %path.display(), %error, "Skipping image");
                self.failures.fetch_add(1, Ordering::AcqRel);
                Fingerprinted::Failed
            }
            Err(_) => {
                warn!(path = %path.display(), "Hasher panicked, skipping image");
                self.failures.fetch_add(1, Ordering::AcqRel);
                Fingerprinted::Failed
            }
        }
    }

    /// Sequential half: match against the index, publish, count.
    fn record(&self, path: &Path, fingerprinted: Fingerprinted) {
        let fingerprint = match fingerprinted {
            Fingerprinted::Skipped => return,
            Fingerprinted::Failed => None,
            Fingerprinted::Ready(fingerprint) => Some(fingerprint),
        };

        // Lookup and insert must be one step, or two near-identical images
        // could both become representatives
        let (processed, found) = {
            let mut state = self.lock_state();
            let found = fingerprint.and_then(|fingerprint| {
                match state.index.insert_or_match(fingerprint, path) {
                    IndexOutcome::Duplicate {
                        representative,
                        distance,
                    } => {
                        let pair = DuplicatePair::new(path.to_path_buf(), representative, distance);
                        self.stream.publish(pair.clone());
                        state.duplicates += 1;
                        Some(pair)
                    }
                    IndexOutcome::Representative => None,
                    IndexOutcome::AlreadyIndexed => {
                        debug!(path = %path.display(), "Already indexed");
                        None
                    }
                }
            });
            state.processed += 1;
            (state.processed, found)
        };

        if let Some(pair) = found {
            info!(
                path = %pair.path.display(),
                representative = %pair.representative.display(),
                distance = pair.distance,
                "Duplicate found"
            );
            self.notifier.duplicate_found(pair);
        }

        if processed % self.config.cache_save_interval() == 0 {
            self.flush_cache();
        }
        if processed % PROGRESS_INTERVAL == 0 {
            self.report_progress();
        }
    }

    /// Cached fingerprint if the mtime still matches, otherwise hash and
    /// remember it
    fn fingerprint_for(&self, path: &Path) -> std::result::Result<Fingerprint, HashError> {
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .map_err(|source| HashError::IoError {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(fingerprint) = self.cache.get(path, modified) {
            self.cache_hits.fetch_add(1, Ordering::AcqRel);
            debug!(path = %path.display(), "Cache hit");
            return Ok(fingerprint);
        }

        let fingerprint = self.hasher.hash_file(path)?;
        self.hashed.fetch_add(1, Ordering::AcqRel);
        self.cache.put(path, modified, fingerprint);
        debug!(path = %path.display(), %fingerprint, "Hashed");
        Ok(fingerprint)
    }

    fn progress(&self) -> f64 {
        let total = self.total.load(Ordering::Acquire);
        if total == 0 {
            return if self.complete.load(Ordering::Acquire) {
                100.0
            } else {
                0.0
            };
        }
        let processed = self.lock_state().processed;
        (processed as f64 / total as f64 * 100.0).min(100.0)
    }

    fn report_progress(&self) {
        self.notifier.progress(self.progress());
    }

    fn flush_cache(&self) {
        if let Err(error) = self.cache.flush() {
            error!(%error, "Failed to save hash cache, continuing");
        }
    }

    /// Runs exactly once per finder, however the run ended
    fn finish(&self, cancelled: bool) {
        self.flush_cache();
        self.complete.store(true, Ordering::Release);
        self.stream.close();
        self.notifier.processing_complete(cancelled);
    }
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("hash-worker-{}", i))
        .build()
        .map_err(|e| DuplicateFinderError::WorkerPool {
            threads,
            reason: e.to_string(),
        })
}
