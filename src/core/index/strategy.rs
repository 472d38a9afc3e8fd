//! Distance threshold and match labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default maximum Hamming distance for two images to count as duplicates
pub const DEFAULT_THRESHOLD: u32 = 10;

/// How close a duplicate is to its representative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Same fingerprint
    Exact,
    /// 1-4 bits apart: recompressed or resized copies
    NearExact,
    /// 5-10 bits apart
    Similar,
    /// Further than the default threshold allows
    Loose,
}

impl MatchType {
    pub fn from_distance(distance: u32) -> Self {
        match distance {
            0 => Self::Exact,
            1..=4 => Self::NearExact,
            5..=DEFAULT_THRESHOLD => Self::Similar,
            _ => Self::Loose,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::NearExact => "near-exact",
            Self::Similar => "similar",
            Self::Loose => "loose",
        })
    }
}

/// Inclusive upper bound on the distance of a duplicate.
///
/// 0 accepts only identical fingerprints; around 5 is conservative; above
/// 15 unrelated images start to pair up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdStrategy {
    threshold: u32,
}

impl ThresholdStrategy {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn is_duplicate(&self, distance: u32) -> bool {
        distance <= self.threshold
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let strategy = ThresholdStrategy::default();

        assert!(strategy.is_duplicate(0));
        assert!(strategy.is_duplicate(10));
        assert!(!strategy.is_duplicate(11));
    }

    #[test]
    fn zero_threshold_only_accepts_identical() {
        let strategy = ThresholdStrategy::new(0);

        assert!(strategy.is_duplicate(0));
        assert!(!strategy.is_duplicate(1));
    }

    #[test]
    fn labels_follow_distance_bands() {
        assert_eq!(MatchType::from_distance(0), MatchType::Exact);
        assert_eq!(MatchType::from_distance(4), MatchType::NearExact);
        assert_eq!(MatchType::from_distance(5), MatchType::Similar);
        assert_eq!(MatchType::from_distance(10), MatchType::Similar);
        assert_eq!(MatchType::from_distance(11), MatchType::Loose);
        assert_eq!(MatchType::Loose.to_string(), "loose");
    }
}
