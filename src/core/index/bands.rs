//! # Band Index
//!
//! Candidate retrieval for Hamming-distance lookups without scanning every
//! entry.
//!
//! ## How It Works
//! 1. Split the 64 fingerprint bits into `threshold + 1` disjoint bands
//! 2. Bucket every entry by the exact value of each band
//! 3. Two fingerprints within `threshold` bits differ in at most `threshold`
//!    bands, so they agree exactly on at least one band
//!
//! Every true match therefore shows up as a candidate. Candidates are
//! returned in insertion order, so checking them in that order finds the
//! same first match a linear scan would.

use crate::core::hasher::Fingerprint;
use std::collections::HashMap;

/// Narrowest band worth bucketing; below this almost everything collides
pub const MIN_BITS_PER_BAND: u32 = 4;

/// Bit range covered by one band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Band {
    shift: u32,
    mask: u64,
}

impl Band {
    fn value(&self, fingerprint: Fingerprint) -> u64 {
        (fingerprint.bits() >> self.shift) & self.mask
    }
}

/// Multi-index over fingerprint bands.
///
/// Stores entry positions only; the owner keeps the entries themselves.
#[derive(Debug)]
pub struct BandIndex {
    bands: Vec<Band>,
    /// band -> (band value -> entry positions, ascending)
    tables: Vec<HashMap<u64, Vec<usize>>>,
}

impl BandIndex {
    /// Build an index that finds every fingerprint within `threshold`.
    ///
    /// Returns `None` when the bands would be too narrow to prune anything.
    pub fn for_threshold(threshold: u32) -> Option<Self> {
        let band_count = threshold.checked_add(1)?;
        if band_count > Fingerprint::BITS / MIN_BITS_PER_BAND {
            return None;
        }
        Some(Self::with_bands(band_count))
    }

    fn with_bands(band_count: u32) -> Self {
        let base = Fingerprint::BITS / band_count;
        let wider = Fingerprint::BITS % band_count;

        let mut bands = Vec::with_capacity(band_count as usize);
        let mut shift = 0;
        for band in 0..band_count {
            // The first `wider` bands absorb the leftover bits
            let width = base + u32::from(band < wider);
            let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
            bands.push(Band { shift, mask });
            shift += width;
        }

        let tables = (0..band_count).map(|_| HashMap::new()).collect();
        Self { bands, tables }
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Register the entry stored at `position`.
    ///
    /// Positions must be added in increasing order.
    pub fn add(&mut self, position: usize, fingerprint: Fingerprint) {
        for (band, table) in self.bands.iter().zip(self.tables.iter_mut()) {
            table.entry(band.value(fingerprint)).or_default().push(position);
        }
    }

    /// Positions sharing at least one band with `fingerprint`, ascending and
    /// without repeats
    pub fn candidates(&self, fingerprint: Fingerprint) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .bands
            .iter()
            .zip(self.tables.iter())
            .filter_map(|(band, table)| table.get(&band.value(fingerprint)))
            .flatten()
            .copied()
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}
