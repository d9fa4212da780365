//! Start/stop/step transitions over groups.
//!
//! Every transition edits the group's persisted [`PlayoutState`] and then
//! re-resolves the plan. If resolution fails the previous playout state and
//! plan are put back, so a rejected edit never leaves a half-applied group.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::clock::Timestamp;
use crate::models::{Group, GroupId, PlaybackMode, PlaybackPolicy, PlayoutState};
use crate::playhead::{project_group, PlayState};
use crate::timeline::{effective_mode, PreparedPlayData, ResolutionError, TimelineResolver};
use crate::{log_changes, log_checks};

use super::state::{GroupSession, PlayoutPhase, StepDirection};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayoutError {
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Part not found: {0}")]
    PartNotFound(String),
    #[error("Policy locked: {0}")]
    PolicyLocked(String),
    #[error("Group is not playing")]
    NotPlaying,
    #[error("Group has no parts: {0}")]
    EmptyGroup(String),
}

/// Result of sampling a group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleOutcome {
    pub state: PlayState,
    /// The group reached its natural end and was stopped by this sample.
    pub auto_stopped: bool,
}

/// What to put back when a transition is rejected.
struct Snapshot {
    policy: PlaybackPolicy,
    playout: PlayoutState,
    plan: Option<PreparedPlayData>,
}

impl Snapshot {
    fn of(group: &Group) -> Self {
        Self {
            policy: group.policy,
            playout: group.playout.clone(),
            plan: group.prepared_play_data.clone(),
        }
    }

    fn restore(self, group: &mut Group) {
        group.policy = self.policy;
        group.playout = self.playout;
        group.prepared_play_data = self.plan;
    }
}

pub struct GroupPlayoutController {
    resolver: TimelineResolver,
    sessions: FxHashMap<GroupId, GroupSession>,
    auto_stop_confirm_samples: u32,
    verbosity: u8,
}

impl Default for GroupPlayoutController {
    fn default() -> Self {
        Self::new(2, 0)
    }
}

impl GroupPlayoutController {
    pub fn new(auto_stop_confirm_samples: u32, verbosity: u8) -> Self {
        Self {
            resolver: TimelineResolver::new(verbosity),
            sessions: FxHashMap::default(),
            auto_stop_confirm_samples: auto_stop_confirm_samples.max(1),
            verbosity,
        }
    }

    pub fn phase(&self, group_id: &str) -> PlayoutPhase {
        self.sessions
            .get(group_id)
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    /// Start playback, optionally from a specific part.
    pub fn start(
        &mut self,
        group: &mut Group,
        part_id: Option<&str>,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        if group.parts.is_empty() {
            return Err(PlayoutError::EmptyGroup(group.id.clone()));
        }
        if let Some(id) = part_id {
            if !group.contains_part(id) {
                return Err(PlayoutError::PartNotFound(id.to_string()));
            }
        }

        let snapshot = Snapshot::of(group);
        let first = group.parts[0].id.clone();

        match effective_mode(group) {
            PlaybackMode::Concurrent => match part_id {
                // Retrigger one part, others keep their own schedule
                Some(id) => {
                    group.playout.part_start_times.insert(id.to_string(), now);
                    if !group.playout.active_part_ids.iter().any(|a| a == id) {
                        group.playout.active_part_ids.push(id.to_string());
                    }
                    group.playout.start_time.get_or_insert(now);
                }
                None => {
                    group.playout.start_time = Some(now);
                    group.playout.active_part_ids =
                        group.parts.iter().map(|p| p.id.clone()).collect();
                    group.playout.part_start_times =
                        group.parts.iter().map(|p| (p.id.clone(), now)).collect();
                }
            },
            PlaybackMode::Sequential { .. } => {
                group.playout.start_time = Some(now);
                group.playout.active_part_ids = vec![part_id.map_or(first, str::to_string)];
                group.playout.part_start_times.clear();
            }
        }

        self.apply(group, snapshot, PlayoutPhase::Playing, now)?;
        log_changes!(
            self.verbosity,
            "Group {} playing from {}",
            group.id,
            group.playout.active_part_ids.join(", ")
        );
        Ok(())
    }

    /// Stop the group. Stopping a stopped group is a no-op.
    pub fn stop(&mut self, group: &mut Group) {
        let was_running = self.phase(&group.id).is_running() || group.playout.is_active();
        group.playout.clear();
        group.prepared_play_data = Some(PreparedPlayData::empty());
        self.session(&group.id).enter(PlayoutPhase::Stopped);
        if was_running {
            log_changes!(self.verbosity, "Group {} stopped", group.id);
        }
    }

    /// Stop a single concurrently playing part.
    ///
    /// In sequential groups stopping the current part stops the group.
    pub fn stop_part(
        &mut self,
        group: &mut Group,
        part_id: &str,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        if !group.contains_part(part_id) {
            return Err(PlayoutError::PartNotFound(part_id.to_string()));
        }
        if !group.playout.is_active() {
            return Err(PlayoutError::NotPlaying);
        }

        match effective_mode(group) {
            PlaybackMode::Sequential { .. } => {
                if project_group(group, now).is_part_playing(part_id)
                    || group.playout.active_part_ids.iter().any(|a| a == part_id)
                {
                    self.stop(group);
                }
                Ok(())
            }
            PlaybackMode::Concurrent => {
                let snapshot = Snapshot::of(group);
                group.playout.part_start_times.remove(part_id);
                group.playout.active_part_ids.retain(|a| a != part_id);
                if group.playout.part_start_times.is_empty() {
                    self.stop(group);
                    return Ok(());
                }
                self.apply(group, snapshot, PlayoutPhase::Playing, now)
            }
        }
    }

    /// Move a manual sequential group to the neighbouring part.
    pub fn step(
        &mut self,
        group: &mut Group,
        direction: StepDirection,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        if !PlayoutPhase::Stepping.allowed_for(group) {
            return Err(PlayoutError::PolicyLocked(format!(
                "group {} does not step manually",
                group.id
            )));
        }
        let count = group.parts.len();
        if count == 0 {
            return Err(PlayoutError::EmptyGroup(group.id.clone()));
        }

        let current = group
            .playout
            .active_part_ids
            .first()
            .and_then(|id| group.part_index(id));
        let looping = group.policy.looping;
        let target = match (current, direction) {
            (None, StepDirection::Next) => 0,
            (None, StepDirection::Previous) => count - 1,
            (Some(idx), StepDirection::Next) if idx + 1 < count => idx + 1,
            (Some(_), StepDirection::Next) if looping => 0,
            (Some(idx), StepDirection::Next) => idx,
            (Some(0), StepDirection::Previous) if looping => count - 1,
            (Some(idx), StepDirection::Previous) => idx.saturating_sub(1),
        };

        let snapshot = Snapshot::of(group);
        group.playout.start_time = Some(now);
        group.playout.active_part_ids = vec![group.parts[target].id.clone()];
        self.apply(group, snapshot, PlayoutPhase::Stepping, now)?;
        log_changes!(
            self.verbosity,
            "Group {} stepped to {}",
            group.id,
            group.parts[target].id
        );
        Ok(())
    }

    pub fn set_one_at_a_time(
        &mut self,
        group: &mut Group,
        value: bool,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        Self::check_unlocked(group)?;
        if group.policy.one_at_a_time == value {
            return Ok(());
        }
        let state = project_group(group, now);
        if !group.policy.one_at_a_time && state.any_part_is_playing {
            return Err(PlayoutError::PolicyLocked(format!(
                "group {} has parts playing concurrently",
                group.id
            )));
        }

        let snapshot = Snapshot::of(group);
        group.policy.one_at_a_time = value;
        if !value {
            // Carry the current part over with its own trigger time
            group.playout.part_start_times = state
                .playing_parts
                .iter()
                .map(|p| (p.part_id.clone(), p.start_time))
                .collect();
            group.playout.active_part_ids =
                state.playing_parts.iter().map(|p| p.part_id.clone()).collect();
        }
        self.reapply(group, snapshot, now)
    }

    pub fn set_loop(
        &mut self,
        group: &mut Group,
        value: bool,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        self.check_sequential(group)?;
        if group.policy.looping == value {
            return Ok(());
        }
        let snapshot = Snapshot::of(group);
        group.policy.looping = value;
        Self::rebase_on_current(group, now);
        self.reapply(group, snapshot, now)
    }

    pub fn set_auto_play(
        &mut self,
        group: &mut Group,
        value: bool,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        self.check_sequential(group)?;
        if group.policy.auto_play == value {
            return Ok(());
        }
        let snapshot = Snapshot::of(group);
        group.policy.auto_play = value;
        Self::rebase_on_current(group, now);
        self.reapply(group, snapshot, now)
    }

    /// Drop references to parts that no longer exist, then re-resolve.
    ///
    /// A sequential group keeps the part that is on air at `now` and its
    /// start time; the parts after it are laid out again.
    pub fn on_group_edited(&mut self, group: &mut Group, now: Timestamp) -> Result<(), PlayoutError> {
        if !group.playout.is_active() {
            group.playout.clear();
            return self.resolve_into(group, now);
        }

        let snapshot = Snapshot::of(group);
        if let PlaybackMode::Sequential { .. } = effective_mode(group) {
            // The previous plan still knows what is on air
            let current = project_group(group, now).playing_parts.into_iter().next();
            if let Some(current) = current {
                if !group.contains_part(&current.part_id) {
                    log_checks!(
                        self.verbosity,
                        "Group {} lost its playing part {}",
                        group.id,
                        current.part_id
                    );
                    self.stop(group);
                    return Ok(());
                }
                group.playout.start_time = Some(current.start_time);
                group.playout.active_part_ids = vec![current.part_id];
            }
        }

        let parts = &group.parts;
        group
            .playout
            .active_part_ids
            .retain(|id| parts.iter().any(|p| &p.id == id));
        group
            .playout
            .part_start_times
            .retain(|id, _| parts.iter().any(|p| &p.id == id));

        let nothing_left = match effective_mode(group) {
            PlaybackMode::Concurrent => group.playout.part_start_times.is_empty(),
            PlaybackMode::Sequential { .. } => group.playout.active_part_ids.is_empty(),
        };
        if nothing_left {
            log_checks!(self.verbosity, "Group {} lost its playing parts", group.id);
            self.stop(group);
            return Ok(());
        }

        let phase = match self.phase(&group.id) {
            PlayoutPhase::Stopped => PlayoutPhase::Playing,
            phase => phase,
        };
        self.apply(group, snapshot, phase, now)
    }

    /// Project the group and stop it when it ran out.
    pub fn sample(&mut self, group: &mut Group, now: Timestamp) -> SampleOutcome {
        let outcome = self.observe(group, now);
        if outcome.auto_stopped {
            log::warn!("Group {} reached its end, stopping", group.id);
            self.stop(group);
        }
        outcome
    }

    /// Read-only half of [`sample`](Self::sample): advance the auto-stop
    /// latch without touching the group. When `auto_stopped` is set the
    /// caller must [`stop`](Self::stop) the group.
    pub fn observe(&mut self, group: &Group, now: Timestamp) -> SampleOutcome {
        let state = project_group(group, now);
        let confirm = self.auto_stop_confirm_samples;
        let ends_naturally = matches!(
            effective_mode(group),
            PlaybackMode::Sequential { looping: false, .. }
        );

        let session = self.session(&group.id);
        if !session.phase.is_running() || !ends_naturally || state.group_is_playing {
            session.missed_samples = 0;
            return SampleOutcome {
                state,
                auto_stopped: false,
            };
        }

        session.missed_samples += 1;
        if session.missed_samples < confirm || session.auto_stop_latched {
            return SampleOutcome {
                state,
                auto_stopped: false,
            };
        }

        session.auto_stop_latched = true;
        SampleOutcome {
            state,
            auto_stopped: true,
        }
    }

    /// Rebuild the plan of a freshly loaded group.
    pub fn restore(&mut self, group: &mut Group, now: Timestamp) -> Result<(), PlayoutError> {
        if !group.playout.is_active() {
            self.session(&group.id).enter(PlayoutPhase::Stopped);
            return self.resolve_into(group, now);
        }
        if group.parts.is_empty() {
            self.stop(group);
            return Ok(());
        }
        let snapshot = Snapshot::of(group);
        match self.apply(group, snapshot, PlayoutPhase::Playing, now) {
            Ok(()) => Ok(()),
            Err(err) => {
                // A persisted state that no longer resolves cannot keep playing
                self.stop(group);
                Err(err)
            }
        }
    }

    /// Groups currently in a running phase, sorted.
    pub fn running_groups(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.phase.is_running())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn session(&mut self, group_id: &str) -> &mut GroupSession {
        self.sessions.entry(group_id.to_string()).or_default()
    }

    fn check_unlocked(group: &Group) -> Result<(), PlayoutError> {
        if group.transparent {
            return Err(PlayoutError::PolicyLocked(format!(
                "group {} is transparent",
                group.id
            )));
        }
        Ok(())
    }

    fn check_sequential(&self, group: &Group) -> Result<(), PlayoutError> {
        Self::check_unlocked(group)?;
        if !group.policy.one_at_a_time {
            return Err(PlayoutError::PolicyLocked(format!(
                "group {} plays parts concurrently",
                group.id
            )));
        }
        Ok(())
    }

    fn check_invariants(group: &Group, phase: PlayoutPhase) -> Result<(), PlayoutError> {
        if group.transparent && group.parts.len() > 1 {
            return Err(PlayoutError::InvariantViolation(format!(
                "transparent group {} holds {} parts",
                group.id,
                group.parts.len()
            )));
        }
        if !phase.allowed_for(group) {
            return Err(PlayoutError::InvariantViolation(format!(
                "group {} cannot be in {:?} with {:?}",
                group.id, phase, group.policy
            )));
        }
        Ok(())
    }

    /// Make the currently playing occurrence the new starting point.
    fn rebase_on_current(group: &mut Group, now: Timestamp) {
        if !group.playout.is_active() {
            return;
        }
        let state = project_group(group, now);
        if let Some(current) = state.playing_parts.first() {
            group.playout.start_time = Some(current.start_time);
            group.playout.active_part_ids = vec![current.part_id.clone()];
        }
    }

    /// Re-resolve after a policy toggle, keeping the phase consistent.
    fn reapply(
        &mut self,
        group: &mut Group,
        snapshot: Snapshot,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        let phase = match self.phase(&group.id) {
            PlayoutPhase::Stepping if !PlayoutPhase::Stepping.allowed_for(group) => {
                PlayoutPhase::Playing
            }
            phase => phase,
        };
        if !phase.is_running() {
            return match self.resolve_into(group, now) {
                Ok(()) => Ok(()),
                Err(err) => {
                    snapshot.restore(group);
                    Err(err)
                }
            };
        }
        self.apply(group, snapshot, phase, now)
    }

    /// Resolve into `group` and enter `phase`; on failure put `snapshot` back.
    fn apply(
        &mut self,
        group: &mut Group,
        snapshot: Snapshot,
        phase: PlayoutPhase,
        now: Timestamp,
    ) -> Result<(), PlayoutError> {
        if let Err(err) = Self::check_invariants(group, phase) {
            log::error!("{}; stopping group {}", err, group.id);
            self.stop(group);
            return Err(err);
        }

        match self.resolver.resolve(group, now) {
            Ok(plan) => {
                group.prepared_play_data = Some(plan);
                self.session(&group.id).enter(phase);
                Ok(())
            }
            Err(err) => {
                log::warn!("Keeping previous plan of group {}: {}", group.id, err);
                snapshot.restore(group);
                Err(err.into())
            }
        }
    }

    fn resolve_into(&mut self, group: &mut Group, now: Timestamp) -> Result<(), PlayoutError> {
        let plan = self.resolver.resolve(group, now)?;
        group.prepared_play_data = Some(plan);
        Ok(())
    }
}
