//! Event type definitions for progress reporting.

use crate::core::index::MatchType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted while a finder runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Share of enumerated files processed so far, 0.0 to 100.0
    Progress { percent: f64 },
    /// A newly processed image matched an earlier representative
    DuplicateFound(DuplicatePair),
    /// The run is over; no further events follow
    ProcessingComplete { cancelled: bool },
}

/// A processed image and the representative it duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePair {
    /// The image just processed
    pub path: PathBuf,
    /// The earlier image it matched
    pub representative: PathBuf,
    /// Hamming distance between the two fingerprints
    pub distance: u32,
    /// Classification of the match
    pub match_type: MatchType,
}

impl DuplicatePair {
    pub fn new(path: PathBuf, representative: PathBuf, distance: u32) -> Self {
        Self {
            path,
            representative,
            distance,
            match_type: MatchType::from_distance(distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_classifies_distance() {
        let pair = DuplicatePair::new("/b.png".into(), "/a.png".into(), 3);
        assert_eq!(pair.match_type, MatchType::NearExact);
    }

    #[test]
    fn events_serialize_to_json() {
        let event = Event::DuplicateFound(DuplicatePair::new(
            "/b.png".into(),
            "/a.png".into(),
            0,
        ));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("DuplicateFound"));
        assert!(json.contains("\"match_type\":\"exact\""));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
