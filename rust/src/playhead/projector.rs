//! Projection of a prepared plan onto a point in time.
//!
//! Projection is a pure query over an immutable plan, so any number of
//! observers may sample it at their own cadence.

use rustc_hash::FxHashMap;

use crate::clock::Timestamp;
use crate::models::{Group, PartId};
use crate::timeline::{PreparedPlayData, RepeatingParts, ScheduledPart};

use super::state::{PlayState, PlayingPart, UpcomingPart};

/// Project `plan` at `now`. Total for every plan, including empty ones.
pub fn project(plan: &PreparedPlayData, now: Timestamp) -> PlayState {
    match plan {
        PreparedPlayData::Single { parts, repeating } => {
            project_single(parts, repeating.as_ref(), now)
        }
        PreparedPlayData::Multi { parts } => project_multi(parts, now),
    }
}

/// Project a group's current plan; a group that was never resolved is idle.
pub fn project_group(group: &Group, now: Timestamp) -> PlayState {
    group
        .prepared_play_data
        .as_ref()
        .map(|plan| project(plan, now))
        .unwrap_or_default()
}

/// The occurrence containing `at` in a sorted, non-overlapping list.
fn current_in(parts: &[ScheduledPart], at: Timestamp) -> Option<&ScheduledPart> {
    let idx = parts.partition_point(|p| p.start_time <= at);
    parts[..idx]
        .iter()
        .rev()
        .find(|p| p.duration > 0)
        .filter(|p| p.contains(at))
}

/// The first positive-length occurrence starting after `at`.
fn next_in(parts: &[ScheduledPart], at: Timestamp) -> Option<&ScheduledPart> {
    let idx = parts.partition_point(|p| p.start_time <= at);
    parts[idx..].iter().find(|p| p.duration > 0)
}

/// Position of `now` inside the first cycle of a repeating tail.
fn cycle_position(repeating: &RepeatingParts, now: Timestamp) -> Option<(Timestamp, i64)> {
    if repeating.cycle_duration <= 0 || now < repeating.start_time {
        return None;
    }
    // Widened so that any pair of timestamps has a representable distance
    let distance = i128::from(now) - i128::from(repeating.start_time);
    let offset = distance.rem_euclid(i128::from(repeating.cycle_duration)) as i64;
    Some((repeating.start_time + offset, offset))
}

fn project_single(
    parts: &[ScheduledPart],
    repeating: Option<&RepeatingParts>,
    now: Timestamp,
) -> PlayState {
    let mut state = PlayState::idle();

    let plan_start = match parts.first() {
        Some(first) => first.start_time,
        None => match repeating {
            Some(r) => r.start_time,
            None => return state,
        },
    };
    let main_end = parts.last().map(|p| p.end_time()).unwrap_or(plan_start);

    if let Some(sp) = current_in(parts, now) {
        state.playing_parts.push(PlayingPart {
            part_id: sp.part.id.clone(),
            part_playhead_ms: now.saturating_sub(sp.start_time),
            part_duration_ms: sp.duration,
            start_time: sp.start_time,
        });
    } else if let Some(rep) = repeating {
        if let Some((position, _)) = cycle_position(rep, now) {
            if let Some(sp) = current_in(&rep.parts, position) {
                let playhead = position.saturating_sub(sp.start_time);
                state.playing_parts.push(PlayingPart {
                    part_id: sp.part.id.clone(),
                    part_playhead_ms: playhead,
                    part_duration_ms: sp.duration,
                    start_time: now.saturating_sub(playhead),
                });
            }
        }
    }

    state.any_part_is_playing = !state.playing_parts.is_empty();
    state.group_is_playing = now >= plan_start && (now < main_end || repeating.is_some());
    state.upcoming = upcoming_single(parts, repeating, now);
    state
}

fn upcoming_single(
    parts: &[ScheduledPart],
    repeating: Option<&RepeatingParts>,
    now: Timestamp,
) -> Option<UpcomingPart> {
    if let Some(sp) = next_in(parts, now) {
        return Some(UpcomingPart {
            part_id: sp.part.id.clone(),
            starts_in_ms: sp.start_time.saturating_sub(now),
        });
    }

    let rep = repeating.filter(|r| r.cycle_duration > 0)?;
    let first = rep.parts.iter().find(|p| p.duration > 0)?;

    match cycle_position(rep, now) {
        None => Some(UpcomingPart {
            part_id: first.part.id.clone(),
            starts_in_ms: first.start_time.saturating_sub(now),
        }),
        Some((position, offset)) => match next_in(&rep.parts, position) {
            Some(sp) => Some(UpcomingPart {
                part_id: sp.part.id.clone(),
                starts_in_ms: sp.start_time.saturating_sub(position),
            }),
            // Wraps into the next cycle
            None => Some(UpcomingPart {
                part_id: first.part.id.clone(),
                starts_in_ms: (rep.cycle_duration - offset)
                    .saturating_add(first.start_time.saturating_sub(rep.start_time)),
            }),
        },
    }
}

fn project_multi(parts: &FxHashMap<PartId, ScheduledPart>, now: Timestamp) -> PlayState {
    let mut playing: Vec<&ScheduledPart> = parts.values().filter(|sp| sp.contains(now)).collect();
    playing.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.part_id().cmp(b.part_id()))
    });

    let upcoming = parts
        .values()
        .filter(|sp| sp.start_time > now && sp.duration > 0)
        .min_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.part_id().cmp(b.part_id()))
        })
        .map(|sp| UpcomingPart {
            part_id: sp.part.id.clone(),
            starts_in_ms: sp.start_time.saturating_sub(now),
        });

    let playing_parts: Vec<PlayingPart> = playing
        .into_iter()
        .map(|sp| PlayingPart {
            part_id: sp.part.id.clone(),
            part_playhead_ms: now.saturating_sub(sp.start_time),
            part_duration_ms: sp.duration,
            start_time: sp.start_time,
        })
        .collect();

    let any = !playing_parts.is_empty();
    PlayState {
        group_is_playing: any,
        any_part_is_playing: any,
        playing_parts,
        upcoming,
    }
}
