//! Core data types for the rundown: groups, parts, timeline objects and the
//! externally reported resources they are built from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::clock::Timestamp;
use crate::timeline::{part_timing, PreparedPlayData, ResolutionError};

pub type PartId = String;
pub type GroupId = String;
pub type ResourceId = String;
pub type DeviceId = String;

/// Enable window of a timeline object, relative to the start of its part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enable {
    pub start: i64,
    pub duration: i64,
}

/// A single instruction attached to an output layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineObject {
    pub resource_id: ResourceId,
    /// Device-specific payload, passed through untouched.
    #[serde(default)]
    pub content: serde_json::Value,
    pub enable: Enable,
    pub layer: String,
}

/// A playable unit inside a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: PartId,
    pub name: String,
    #[serde(default)]
    pub timeline: Vec<TimelineObject>,
    #[serde(default)]
    pub resolved_duration: i64,
    #[serde(default)]
    pub auto_filled: bool,
}

impl Part {
    pub fn new(id: impl Into<PartId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            timeline: Vec::new(),
            resolved_duration: 0,
            auto_filled: false,
        }
    }

    /// Recompute `resolved_duration` from the timeline objects.
    pub fn refresh_duration(&mut self) -> Result<i64, ResolutionError> {
        self.resolved_duration = part_timing(self)?;
        Ok(self.resolved_duration)
    }
}

/// Playback policy of a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPolicy {
    pub one_at_a_time: bool,
    pub auto_play: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
}

/// Playback mode derived from a [`PlaybackPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Parts play independently, each on its own schedule.
    Concurrent,
    /// At most one part is current at any time.
    Sequential { auto_play: bool, looping: bool },
}

impl PlaybackPolicy {
    /// Loop and auto-play only apply to sequential playback.
    pub fn mode(&self) -> PlaybackMode {
        if self.one_at_a_time {
            PlaybackMode::Sequential {
                auto_play: self.auto_play,
                looping: self.looping,
            }
        } else {
            PlaybackMode::Concurrent
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoFillMode {
    /// Mirror the resource set, keeping manual parts in place.
    #[default]
    Replace,
    /// Only ever add parts for new resources.
    Append,
}

/// Which resources a group mirrors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFillRule {
    /// Layer the synthesized timeline objects target.
    pub layer_id: String,
    /// Case-insensitive substring of the resource display name.
    #[serde(default)]
    pub filter: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFillSettings {
    pub enabled: bool,
    pub mode: AutoFillMode,
    #[serde(default)]
    pub rule: AutoFillRule,
}

/// Persisted playout state of a group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayoutState {
    /// When playback started. `None` = not playing.
    pub start_time: Option<Timestamp>,
    /// Parts to be played, in this order.
    #[serde(default)]
    pub active_part_ids: Vec<PartId>,
    /// Trigger time of each concurrently playing part.
    #[serde(default)]
    pub part_start_times: BTreeMap<PartId, Timestamp>,
}

impl PlayoutState {
    pub fn is_active(&self) -> bool {
        self.start_time.is_some() || !self.part_start_times.is_empty()
    }

    pub fn clear(&mut self) {
        self.start_time = None;
        self.active_part_ids.clear();
        self.part_start_times.clear();
    }
}

/// Ordered playback container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Holds a single part and is hidden from the operator.
    #[serde(default)]
    pub transparent: bool,
    #[serde(default)]
    pub parts: Vec<Arc<Part>>,
    #[serde(default)]
    pub policy: PlaybackPolicy,
    #[serde(default)]
    pub auto_fill: AutoFillSettings,
    #[serde(default)]
    pub playout: PlayoutState,
    /// Rebuilt on load, never persisted.
    #[serde(skip)]
    pub prepared_play_data: Option<PreparedPlayData>,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transparent: false,
            parts: Vec::new(),
            policy: PlaybackPolicy::default(),
            auto_fill: AutoFillSettings::default(),
            playout: PlayoutState::default(),
            prepared_play_data: None,
        }
    }

    pub fn part(&self, part_id: &str) -> Option<&Arc<Part>> {
        self.parts.iter().find(|p| p.id == part_id)
    }

    pub fn part_index(&self, part_id: &str) -> Option<usize> {
        self.parts.iter().position(|p| p.id == part_id)
    }

    pub fn contains_part(&self, part_id: &str) -> bool {
        self.part_index(part_id).is_some()
    }
}

/// An externally reported playable asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub device_id: DeviceId,
    pub display_name: String,
    /// Natural length of the asset, when the device knows it.
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Resource {
    pub fn new(
        id: impl Into<ResourceId>,
        device_id: impl Into<DeviceId>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            device_id: device_id.into(),
            display_name: display_name.into(),
            duration_ms: None,
            content: serde_json::Value::Null,
        }
    }
}

/// A resource added, changed (`Some`) or removed (`None`).
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceUpdate {
    pub id: ResourceId,
    pub resource: Option<Resource>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rundown {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Rundown {
    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn group_mut(&mut self, group_id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == group_id)
    }
}

/// Maps a layer id to the device that plays it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMapping {
    pub device_id: DeviceId,
    #[serde(default)]
    pub layer_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mappings: BTreeMap<String, LayerMapping>,
    /// Devices currently configured on the gateways.
    #[serde(default)]
    pub devices: BTreeSet<DeviceId>,
    #[serde(default)]
    pub auto_refresh_interval_ms: Option<u64>,
}
