//! The resolved execution plan of a group.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::clock::Timestamp;
use crate::models::{Part, PartId};

/// One occurrence of a part at an absolute time.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledPart {
    pub part: Arc<Part>,
    pub start_time: Timestamp,
    pub duration: i64,
}

impl ScheduledPart {
    pub fn part_id(&self) -> &str {
        &self.part.id
    }

    /// Saturates at the end of the timestamp range.
    pub fn end_time(&self) -> Timestamp {
        self.start_time.saturating_add(self.duration)
    }

    /// Half-open window: zero-duration occurrences never contain `now`.
    #[inline]
    pub fn contains(&self, now: Timestamp) -> bool {
        now >= self.start_time && now < self.end_time()
    }
}

/// Looping tail of a sequential plan.
///
/// `parts` holds the first cycle at absolute times starting at `start_time`;
/// later cycles repeat every `cycle_duration` milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct RepeatingParts {
    pub parts: Vec<ScheduledPart>,
    pub start_time: Timestamp,
    pub cycle_duration: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PreparedPlayData {
    /// One-at-a-time playback. `parts` are sorted and non-overlapping.
    Single {
        parts: Vec<ScheduledPart>,
        repeating: Option<RepeatingParts>,
    },
    /// Concurrent playback, each part on its own schedule.
    Multi {
        parts: FxHashMap<PartId, ScheduledPart>,
    },
}

impl PreparedPlayData {
    /// A resolved plan with nothing to play.
    pub fn empty() -> Self {
        PreparedPlayData::Single {
            parts: Vec::new(),
            repeating: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PreparedPlayData::Single { parts, repeating } => {
                parts.is_empty() && repeating.is_none()
            }
            PreparedPlayData::Multi { parts } => parts.is_empty(),
        }
    }

    /// Ids of every part that occurs anywhere in the plan.
    pub fn scheduled_part_ids(&self) -> FxHashSet<&str> {
        match self {
            PreparedPlayData::Single { parts, repeating } => parts
                .iter()
                .chain(repeating.iter().flat_map(|r| r.parts.iter()))
                .map(|p| p.part_id())
                .collect(),
            PreparedPlayData::Multi { parts } => parts.keys().map(|k| k.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(id: &str, start: Timestamp, duration: i64) -> ScheduledPart {
        ScheduledPart {
            part: Arc::new(Part::new(id, id)),
            start_time: start,
            duration,
        }
    }

    #[test]
    fn test_window_is_half_open() {
        let sp = scheduled("a", 100, 50);
        assert!(!sp.contains(99));
        assert!(sp.contains(100));
        assert!(sp.contains(149));
        assert!(!sp.contains(150));
    }

    #[test]
    fn test_zero_duration_never_contains() {
        let sp = scheduled("a", 100, 0);
        assert!(!sp.contains(100));
    }

    #[test]
    fn test_empty_plan() {
        let plan = PreparedPlayData::empty();
        assert!(plan.is_empty());
        assert!(plan.scheduled_part_ids().is_empty());
    }

    #[test]
    fn test_scheduled_part_ids_include_repeating() {
        let plan = PreparedPlayData::Single {
            parts: vec![scheduled("b", 0, 10)],
            repeating: Some(RepeatingParts {
                parts: vec![scheduled("a", 10, 5), scheduled("b", 15, 10)],
                start_time: 10,
                cycle_duration: 15,
            }),
        };
        let ids = plan.scheduled_part_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("a"));
        assert!(!plan.is_empty());
    }
}
