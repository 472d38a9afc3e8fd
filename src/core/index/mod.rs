//! # Index Module
//!
//! Incremental near-duplicate detection.
//!
//! Every processed image is offered to the index once. If an earlier image
//! lies within the threshold the new one is reported as its duplicate and
//! is *not* inserted; otherwise it becomes a representative that later
//! images are compared against.
//!
//! ## Comparison Thresholds
//! | Distance | Classification |
//! |----------|---------------|
//! | 0        | Exact match   |
//! | 1-4      | Near-exact    |
//! | 5-10     | Similar       |
//! | 11+      | Loose         |
//!
//! The index is not synchronized. Callers sharing it across threads must
//! hold one lock across the whole `insert_or_match` call, otherwise two
//! near-identical images can both become representatives.

mod bands;
mod strategy;

pub use bands::BandIndex;
pub use strategy::{MatchType, ThresholdStrategy, DEFAULT_THRESHOLD};

use crate::core::hasher::Fingerprint;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A representative stored in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub fingerprint: Fingerprint,
    pub path: PathBuf,
}

/// Result of offering an image to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Matched an earlier representative
    Duplicate {
        representative: PathBuf,
        distance: u32,
    },
    /// Stored as a new representative
    Representative,
    /// Path was already a representative; nothing changed
    AlreadyIndexed,
}

/// Near-duplicate index over representative fingerprints
#[derive(Debug)]
pub struct NearDuplicateIndex {
    strategy: ThresholdStrategy,
    /// Representatives in insertion order; first match wins
    entries: Vec<IndexEntry>,
    paths: HashSet<PathBuf>,
    /// Absent when the threshold is too wide for banding to help
    bands: Option<BandIndex>,
}

impl NearDuplicateIndex {
    pub fn new(threshold: u32) -> Self {
        Self::with_strategy(ThresholdStrategy::new(threshold))
    }

    pub fn with_strategy(strategy: ThresholdStrategy) -> Self {
        Self {
            bands: BandIndex::for_threshold(strategy.threshold()),
            strategy,
            entries: Vec::new(),
            paths: HashSet::new(),
        }
    }

    /// Always compare against every representative
    pub fn linear(threshold: u32) -> Self {
        Self {
            bands: None,
            ..Self::new(threshold)
        }
    }

    pub fn strategy(&self) -> &ThresholdStrategy {
        &self.strategy
    }

    /// Whether lookups go through the band index
    pub fn is_banded(&self) -> bool {
        self.bands.is_some()
    }

    /// Number of representatives
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Representatives in insertion order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// First representative (in insertion order) within the threshold
    pub fn find_match(&self, fingerprint: Fingerprint) -> Option<(&IndexEntry, u32)> {
        let within = |entry: &IndexEntry| {
            let distance = entry.fingerprint.distance(fingerprint);
            self.strategy.is_duplicate(distance).then_some(distance)
        };

        match &self.bands {
            Some(bands) => bands
                .candidates(fingerprint)
                .into_iter()
                .filter_map(|position| self.entries.get(position))
                .find_map(|entry| within(entry).map(|distance| (entry, distance))),
            None => self
                .entries
                .iter()
                .find_map(|entry| within(entry).map(|distance| (entry, distance))),
        }
    }

    /// Match against earlier representatives or become one.
    pub fn insert_or_match(&mut self, fingerprint: Fingerprint, path: &Path) -> IndexOutcome {
        if self.paths.contains(path) {
            return IndexOutcome::AlreadyIndexed;
        }

        if let Some((entry, distance)) = self.find_match(fingerprint) {
            return IndexOutcome::Duplicate {
                representative: entry.path.clone(),
                distance,
            };
        }

        let position = self.entries.len();
        if let Some(bands) = self.bands.as_mut() {
            bands.add(position, fingerprint);
        }
        self.entries.push(IndexEntry {
            fingerprint,
            path: path.to_path_buf(),
        });
        self.paths.insert(path.to_path_buf());
        IndexOutcome::Representative
    }

    /// Returns the representative `path` duplicates, or `None` when it was
    /// inserted (or was already indexed).
    pub fn lookup_or_insert(&mut self, fingerprint: Fingerprint, path: &Path) -> Option<PathBuf> {
        match self.insert_or_match(fingerprint, path) {
            IndexOutcome::Duplicate { representative, .. } => Some(representative),
            IndexOutcome::Representative | IndexOutcome::AlreadyIndexed => None,
        }
    }
}
