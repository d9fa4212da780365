//! Derived playback state, never persisted.

use crate::clock::Timestamp;
use crate::models::PartId;

/// A part whose occurrence contains the sampled time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayingPart {
    pub part_id: PartId,
    /// Milliseconds since the occurrence started, always >= 0.
    pub part_playhead_ms: i64,
    pub part_duration_ms: i64,
    pub start_time: Timestamp,
}

/// The next occurrence that will start after the sampled time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpcomingPart {
    pub part_id: PartId,
    pub starts_in_ms: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayState {
    pub group_is_playing: bool,
    pub any_part_is_playing: bool,
    pub playing_parts: Vec<PlayingPart>,
    pub upcoming: Option<UpcomingPart>,
}

impl PlayState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_part_playing(&self, part_id: &str) -> bool {
        self.playing_parts.iter().any(|p| p.part_id == part_id)
    }
}
