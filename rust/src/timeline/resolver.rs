//! Resolver from a group's declarative state to a [`PreparedPlayData`].

use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::{format_timestamp, Timestamp};
use crate::models::{Group, Part, PlaybackMode};
use crate::{log_changes, log_debug};

use super::part_timing::part_timing;
use super::prepared::{PreparedPlayData, RepeatingParts, ScheduledPart};

/// Errors raised while resolving a group. A failed resolve never yields a
/// partial plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Timeline object {index} of part {part_id} has a negative duration")]
    NegativeDuration { part_id: String, index: usize },
    #[error("Timeline object {index} of part {part_id} starts before its part")]
    NegativeStart { part_id: String, index: usize },
    #[error("Timeline object {index} of part {part_id} ends beyond the representable range")]
    WindowOverflow { part_id: String, index: usize },
    #[error("Part not found in group: {0}")]
    UnknownPart(String),
}

/// Playback mode a group is actually resolved with.
///
/// Transparent groups bypass the policy: their single part plays once.
pub fn effective_mode(group: &Group) -> PlaybackMode {
    if group.transparent {
        PlaybackMode::Sequential {
            auto_play: false,
            looping: false,
        }
    } else {
        group.policy.mode()
    }
}

/// Resolve a group with default settings.
pub fn resolve(group: &Group, now: Timestamp) -> Result<PreparedPlayData, ResolutionError> {
    TimelineResolver::default().resolve(group, now)
}

/// Computes absolute schedules for groups.
#[derive(Clone, Debug, Default)]
pub struct TimelineResolver {
    verbosity: u8,
}

impl TimelineResolver {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Resolve the plan for `group` as of `now`.
    ///
    /// Pure: the same group and timestamp always produce an equal plan.
    pub fn resolve(
        &self,
        group: &Group,
        now: Timestamp,
    ) -> Result<PreparedPlayData, ResolutionError> {
        let plan = match effective_mode(group) {
            PlaybackMode::Concurrent => self.resolve_concurrent(group, now)?,
            PlaybackMode::Sequential { auto_play, looping } => {
                self.resolve_sequential(group, auto_play, looping)?
            }
        };

        log_changes!(
            self.verbosity,
            "Resolved group {} at {}: {} scheduled part(s)",
            group.id,
            format_timestamp(now),
            plan.scheduled_part_ids().len()
        );
        Ok(plan)
    }

    /// Every triggered part gets its own absolute start. Occurrences that
    /// finished before `now` are left out.
    fn resolve_concurrent(
        &self,
        group: &Group,
        now: Timestamp,
    ) -> Result<PreparedPlayData, ResolutionError> {
        let playout = &group.playout;
        let mut parts = FxHashMap::default();

        for part in &group.parts {
            // Fall back to the group start for parts listed without their own time
            let start = match playout.part_start_times.get(&part.id) {
                Some(&start) => start,
                None => match playout.start_time {
                    Some(start) if playout.active_part_ids.contains(&part.id) => start,
                    _ => continue,
                },
            };

            let duration = part_timing(part)?;
            if start.checked_add(duration).is_none() {
                return Err(ResolutionError::WindowOverflow {
                    part_id: part.id.clone(),
                    index: 0,
                });
            }
            let scheduled = ScheduledPart {
                part: Arc::clone(part),
                start_time: start,
                duration,
            };
            if scheduled.end_time() <= now {
                log_debug!(self.verbosity, "  {} already ended, omitted", part.id);
                continue;
            }
            log_debug!(
                self.verbosity,
                "  {} at {} for {}ms",
                part.id,
                scheduled.start_time,
                scheduled.duration
            );
            parts.insert(part.id.clone(), scheduled);
        }

        Ok(PreparedPlayData::Multi { parts })
    }

    /// Parts play back to back from the group start time.
    fn resolve_sequential(
        &self,
        group: &Group,
        auto_play: bool,
        looping: bool,
    ) -> Result<PreparedPlayData, ResolutionError> {
        let start_time = match group.playout.start_time {
            Some(t) if !group.parts.is_empty() => t,
            _ => return Ok(PreparedPlayData::empty()),
        };

        let first_pass: Vec<&Arc<Part>> = if auto_play {
            let first = match group.playout.active_part_ids.first() {
                Some(id) => group
                    .part_index(id)
                    .ok_or_else(|| ResolutionError::UnknownPart(id.clone()))?,
                None => 0,
            };
            group.parts[first..].iter().collect()
        } else {
            group
                .playout
                .active_part_ids
                .iter()
                .map(|id| {
                    group
                        .part(id)
                        .ok_or_else(|| ResolutionError::UnknownPart(id.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let (parts, end) = self.lay_out(&first_pass, start_time)?;

        let repeating = if looping {
            let cycle: Vec<&Arc<Part>> = if auto_play {
                group.parts.iter().collect()
            } else {
                first_pass.clone()
            };
            let (cycle_parts, cycle_end) = self.lay_out(&cycle, end)?;
            let cycle_duration = cycle_end - end;
            // A zero-length cycle would never advance
            if cycle_duration > 0 {
                Some(RepeatingParts {
                    parts: cycle_parts,
                    start_time: end,
                    cycle_duration,
                })
            } else {
                None
            }
        } else {
            None
        };

        Ok(PreparedPlayData::Single { parts, repeating })
    }

    /// Place parts back to back from `start`, returning them and the end time.
    ///
    /// Zero-duration parts occupy a zero-width slot and do not move the cursor.
    fn lay_out(
        &self,
        parts: &[&Arc<Part>],
        start: Timestamp,
    ) -> Result<(Vec<ScheduledPart>, Timestamp), ResolutionError> {
        let mut cursor = start;
        let mut scheduled = Vec::with_capacity(parts.len());

        for part in parts {
            let duration = part_timing(part)?;
            log_debug!(self.verbosity, "  {} at {} for {}ms", part.id, cursor, duration);
            scheduled.push(ScheduledPart {
                part: Arc::clone(part),
                start_time: cursor,
                duration,
            });
            cursor = cursor
                .checked_add(duration)
                .ok_or_else(|| ResolutionError::WindowOverflow {
                    part_id: part.id.clone(),
                    index: 0,
                })?;
        }

        Ok((scheduled, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Enable, PlaybackPolicy, TimelineObject};

    fn part(id: &str, duration: i64) -> Arc<Part> {
        let mut p = Part::new(id, id);
        p.timeline.push(TimelineObject {
            resource_id: format!("{}_media", id),
            content: serde_json::Value::Null,
            enable: Enable { start: 0, duration },
            layer: "casparcg-1-10".to_string(),
        });
        p.resolved_duration = duration;
        Arc::new(p)
    }

    fn group(parts: Vec<Arc<Part>>, one_at_a_time: bool, auto_play: bool, looping: bool) -> Group {
        let mut g = Group::new("g", "Group");
        g.parts = parts;
        g.policy = PlaybackPolicy {
            one_at_a_time,
            auto_play,
            looping,
        };
        g
    }

    fn single(plan: &PreparedPlayData) -> (&Vec<ScheduledPart>, &Option<RepeatingParts>) {
        match plan {
            PreparedPlayData::Single { parts, repeating } => (parts, repeating),
            other => panic!("expected single plan, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_group_resolves_to_empty_single() {
        let mut g = group(vec![], true, true, false);
        g.playout.start_time = Some(1000);
        let plan = resolve(&g, 1000).unwrap();
        assert_eq!(plan, PreparedPlayData::empty());
    }

    #[test]
    fn test_not_started_resolves_to_empty() {
        let g = group(vec![part("a", 1000)], true, true, false);
        let plan = resolve(&g, 0).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_sequential_auto_play_chains_parts() {
        let mut g = group(
            vec![part("a", 1000), part("b", 500), part("c", 2000)],
            true,
            true,
            false,
        );
        g.playout.start_time = Some(10_000);
        g.playout.active_part_ids = vec!["b".to_string()];

        let plan = resolve(&g, 10_000).unwrap();
        let (parts, repeating) = single(&plan);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].part_id(), "b");
        assert_eq!(parts[0].start_time, 10_000);
        assert_eq!(parts[1].part_id(), "c");
        assert_eq!(parts[1].start_time, 10_500);
        assert!(repeating.is_none());
    }

    #[test]
    fn test_sequential_loop_builds_repeating_tail() {
        let mut g = group(vec![part("a", 1000), part("b", 500)], true, true, true);
        g.playout.start_time = Some(0);
        g.playout.active_part_ids = vec!["b".to_string()];

        let plan = resolve(&g, 0).unwrap();
        let (parts, repeating) = single(&plan);
        assert_eq!(parts.len(), 1);
        let repeating = repeating.as_ref().unwrap();
        assert_eq!(repeating.start_time, 500);
        assert_eq!(repeating.cycle_duration, 1500);
        assert_eq!(repeating.parts[0].part_id(), "a");
        assert_eq!(repeating.parts[1].start_time, 1500);
    }

    #[test]
    fn test_manual_advance_schedules_only_active() {
        let mut g = group(vec![part("a", 1000), part("b", 500)], true, false, false);
        g.playout.start_time = Some(0);
        g.playout.active_part_ids = vec!["b".to_string()];

        let plan = resolve(&g, 0).unwrap();
        let (parts, repeating) = single(&plan);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].part_id(), "b");
        assert!(repeating.is_none());
    }

    #[test]
    fn test_zero_duration_part_is_non_blocking() {
        let mut g = group(
            vec![part("a", 1000), part("zero", 0), part("c", 1000)],
            true,
            true,
            false,
        );
        g.playout.start_time = Some(0);

        let plan = resolve(&g, 0).unwrap();
        let (parts, _) = single(&plan);
        assert_eq!(parts[1].start_time, 1000);
        assert_eq!(parts[1].duration, 0);
        assert_eq!(parts[2].start_time, 1000);
    }

    #[test]
    fn test_zero_length_loop_has_no_tail() {
        let mut g = group(vec![part("zero", 0)], true, true, true);
        g.playout.start_time = Some(0);
        let plan = resolve(&g, 0).unwrap();
        let (_, repeating) = single(&plan);
        assert!(repeating.is_none());
    }

    #[test]
    fn test_concurrent_parts_use_own_start() {
        let mut g = group(vec![part("a", 1000), part("b", 1000)], false, false, false);
        g.playout.start_time = Some(500);
        g.playout.active_part_ids = vec!["a".to_string(), "b".to_string()];
        g.playout.part_start_times.insert("a".to_string(), 0);
        g.playout.part_start_times.insert("b".to_string(), 500);

        match resolve(&g, 600).unwrap() {
            PreparedPlayData::Multi { parts } => {
                assert_eq!(parts["a"].start_time, 0);
                assert_eq!(parts["b"].start_time, 500);
            }
            other => panic!("expected multi plan, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_start_near_range_end_rejected() {
        let mut g = group(vec![part("a", 1000)], false, false, false);
        g.playout.part_start_times.insert("a".to_string(), i64::MAX - 10);

        let err = resolve(&g, 0).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::WindowOverflow {
                part_id: "a".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn test_concurrent_omits_finished() {
        let mut g = group(vec![part("a", 1000), part("b", 1000)], false, false, false);
        g.playout.part_start_times.insert("a".to_string(), 0);
        g.playout.part_start_times.insert("b".to_string(), 800);

        match resolve(&g, 1200).unwrap() {
            PreparedPlayData::Multi { parts } => {
                assert!(!parts.contains_key("a"));
                assert!(parts.contains_key("b"));
            }
            other => panic!("expected multi plan, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_window_rejected() {
        let mut bad = Part::new("bad", "Bad");
        bad.timeline.push(TimelineObject {
            resource_id: "r".to_string(),
            content: serde_json::Value::Null,
            enable: Enable {
                start: 0,
                duration: -5,
            },
            layer: "l".to_string(),
        });
        let mut g = group(vec![Arc::new(bad)], true, true, false);
        g.playout.start_time = Some(0);
        assert!(matches!(
            resolve(&g, 0),
            Err(ResolutionError::NegativeDuration { .. })
        ));
    }

    #[test]
    fn test_unknown_active_part() {
        let mut g = group(vec![part("a", 1000)], true, false, false);
        g.playout.start_time = Some(0);
        g.playout.active_part_ids = vec!["ghost".to_string()];
        assert_eq!(
            resolve(&g, 0),
            Err(ResolutionError::UnknownPart("ghost".to_string()))
        );
    }

    #[test]
    fn test_transparent_group_ignores_policy() {
        let mut g = group(vec![part("only", 1000)], true, true, true);
        g.transparent = true;
        g.playout.start_time = Some(0);
        g.playout.active_part_ids = vec!["only".to_string()];
        let plan = resolve(&g, 0).unwrap();
        let (parts, repeating) = single(&plan);
        assert_eq!(parts.len(), 1);
        assert!(repeating.is_none());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let mut g = group(vec![part("a", 1000), part("b", 700)], true, true, true);
        g.playout.start_time = Some(42);
        assert_eq!(resolve(&g, 100).unwrap(), resolve(&g, 100).unwrap());

        let mut m = group(vec![part("a", 1000), part("b", 700)], false, false, false);
        m.playout.part_start_times.insert("a".to_string(), 0);
        m.playout.part_start_times.insert("b".to_string(), 10);
        assert_eq!(resolve(&m, 5).unwrap(), resolve(&m, 5).unwrap());
    }
}
