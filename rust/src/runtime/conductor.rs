//! The single writer that ties storage, auto-fill, playout and the gateway
//! together.
//!
//! All mutations of rundown state go through one `Conductor`. Incoming
//! resource changes only arm timers; the work itself happens in [`tick`],
//! so bursts coalesce into one auto-fill pass and one observer batch.
//!
//! [`tick`]: Conductor::tick

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::autofill::{find_autofill_resources, AutoFillReconciler};
use crate::clock::Timestamp;
use crate::config::ConductorConfig;
use crate::interfaces::{
    DeviceGateway, Notification, Observer, RundownStore, StoreError, TransportError,
};
use crate::models::{Group, GroupId, PartId, Project, Resource, ResourceUpdate, Rundown};
use crate::playhead::{project_group, PlayState};
use crate::playout::{GroupPlayoutController, PlayoutError, StepDirection};
use crate::{log_changes, log_checks};

use super::batch::UpdateBatcher;
use super::rate_limit::RateLimiter;
use super::refresh::{AutoRefresh, RefreshDecision};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConductorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Playout(#[from] PlayoutError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Conductor is shutting down")]
    ShuttingDown,
    #[error("Conductor thread panicked")]
    WorkerPanicked,
}

/// Operator commands addressed to a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Play {
        rundown_id: String,
        group_id: GroupId,
        part_id: Option<PartId>,
    },
    Stop {
        rundown_id: String,
        group_id: GroupId,
    },
    StopPart {
        rundown_id: String,
        group_id: GroupId,
        part_id: PartId,
    },
    Step {
        rundown_id: String,
        group_id: GroupId,
        direction: StepDirection,
    },
    SetOneAtATime {
        rundown_id: String,
        group_id: GroupId,
        value: bool,
    },
    SetLoop {
        rundown_id: String,
        group_id: GroupId,
        value: bool,
    },
    SetAutoPlay {
        rundown_id: String,
        group_id: GroupId,
        value: bool,
    },
    RefreshResources,
    SetAutoRefreshInterval(Option<u64>),
}

pub struct Conductor<S: RundownStore, G: DeviceGateway> {
    store: S,
    gateway: G,
    observer: Box<dyn Observer>,
    /// Playout sessions, one controller per rundown.
    controllers: FxHashMap<String, GroupPlayoutController>,
    auto_stop_confirm_samples: u32,
    reconciler: AutoFillReconciler,
    autofill_trigger: RateLimiter,
    resource_batch: UpdateBatcher<ResourceUpdate>,
    auto_refresh: AutoRefresh,
    shutting_down: bool,
    verbosity: u8,
}

impl<S: RundownStore, G: DeviceGateway> Conductor<S, G> {
    pub fn new(store: S, gateway: G, observer: Box<dyn Observer>, config: &ConductorConfig) -> Self {
        Self {
            store,
            gateway,
            observer,
            controllers: FxHashMap::default(),
            auto_stop_confirm_samples: config.auto_stop_confirm_samples,
            reconciler: AutoFillReconciler::new(config.default_part_duration_ms, config.verbosity),
            autofill_trigger: RateLimiter::new(config.autofill_rate_limit_ms),
            resource_batch: UpdateBatcher::new(config.resource_batch_ms),
            auto_refresh: AutoRefresh::new(config.refresh_liveness_ms),
            shutting_down: false,
            verbosity: config.verbosity,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Rebuild every group's plan after load and pick up project settings.
    pub fn rebuild_all_plans(&mut self, now: Timestamp) {
        let interval = self.store.get_project().auto_refresh_interval_ms;
        self.auto_refresh.configure(interval, now);

        for mut rundown in self.cloned_rundowns() {
            let mut group_ids = Vec::with_capacity(rundown.groups.len());
            for group in &mut rundown.groups {
                if let Err(err) = self.controller_for(&rundown.id).restore(group, now) {
                    log::warn!("Group {} could not be restored: {}", group.id, err);
                    self.observer.notify(Notification::GroupFailed {
                        group_id: group.id.clone(),
                        reason: err.to_string(),
                    });
                }
                group_ids.push(group.id.clone());
            }
            self.commit(rundown, &group_ids);
        }
        // Resources may have changed while we were down
        self.autofill_trigger.trigger(now);
    }

    pub fn on_project_changed(&mut self, project: Project, now: Timestamp) {
        if self.shutting_down {
            return;
        }
        let interval = project.auto_refresh_interval_ms;
        self.store.update_project(project);
        self.auto_refresh.configure(interval, now);
        // Layer mappings decide which resources match
        self.autofill_trigger.trigger(now);
    }

    /// Store a resource change and arm the auto-fill pass and observer batch.
    pub fn on_resource_updated(
        &mut self,
        resource_id: &str,
        resource: Option<Resource>,
        now: Timestamp,
    ) {
        if self.shutting_down {
            return;
        }
        self.store.update_resource(resource_id, resource.clone());
        self.resource_batch.push(
            ResourceUpdate {
                id: resource_id.to_string(),
                resource,
            },
            now,
        );
        if !self.autofill_trigger.trigger(now) {
            log_checks!(self.verbosity, "Auto-fill already pending, coalescing {}", resource_id);
        }
    }

    /// Full resource report of one device: diff it against the store.
    pub fn on_gateway_resources(
        &mut self,
        device_id: &str,
        resources: Vec<Resource>,
        now: Timestamp,
    ) {
        if self.shutting_down {
            return;
        }
        let reported: FxHashSet<String> = resources.iter().map(|r| r.id.clone()).collect();

        for resource in resources {
            if self.store.get_resources().get(&resource.id) != Some(&resource) {
                let id = resource.id.clone();
                self.on_resource_updated(&id, Some(resource), now);
            }
        }
        for id in self.store.resource_ids_for_device(device_id) {
            if !reported.contains(&id) {
                self.on_resource_updated(&id, None, now);
            }
        }
    }

    pub fn on_device_refresh_status(&mut self, device_id: &str, refreshing: bool, now: Timestamp) {
        if self.shutting_down {
            return;
        }
        self.auto_refresh
            .set_device_refreshing(device_id, refreshing, now);
        self.observer.notify(Notification::DeviceRefreshStatus {
            device_id: device_id.to_string(),
            refreshing,
        });
    }

    pub fn execute(&mut self, command: ControlCommand, now: Timestamp) -> Result<(), ConductorError> {
        if self.shutting_down {
            return Err(ConductorError::ShuttingDown);
        }
        match command {
            ControlCommand::Play {
                rundown_id,
                group_id,
                part_id,
            } => self.with_group(&rundown_id, &group_id, |c, g| {
                c.start(g, part_id.as_deref(), now)
            }),
            ControlCommand::Stop {
                rundown_id,
                group_id,
            } => self.with_group(&rundown_id, &group_id, |c, g| {
                c.stop(g);
                Ok(())
            }),
            ControlCommand::StopPart {
                rundown_id,
                group_id,
                part_id,
            } => self.with_group(&rundown_id, &group_id, |c, g| {
                c.stop_part(g, &part_id, now)
            }),
            ControlCommand::Step {
                rundown_id,
                group_id,
                direction,
            } => self.with_group(&rundown_id, &group_id, |c, g| c.step(g, direction, now)),
            ControlCommand::SetOneAtATime {
                rundown_id,
                group_id,
                value,
            } => self.with_group(&rundown_id, &group_id, |c, g| {
                c.set_one_at_a_time(g, value, now)
            }),
            ControlCommand::SetLoop {
                rundown_id,
                group_id,
                value,
            } => self.with_group(&rundown_id, &group_id, |c, g| c.set_loop(g, value, now)),
            ControlCommand::SetAutoPlay {
                rundown_id,
                group_id,
                value,
            } => self.with_group(&rundown_id, &group_id, |c, g| {
                c.set_auto_play(g, value, now)
            }),
            ControlCommand::RefreshResources => {
                self.refresh_resources(now);
                Ok(())
            }
            ControlCommand::SetAutoRefreshInterval(interval) => {
                let mut project = self.store.get_project().clone();
                project.auto_refresh_interval_ms = interval;
                self.on_project_changed(project, now);
                Ok(())
            }
        }
    }

    /// Apply an operator edit to a group, then keep playout consistent.
    pub fn edit_group<F>(
        &mut self,
        rundown_id: &str,
        group_id: &str,
        edit: F,
        now: Timestamp,
    ) -> Result<(), ConductorError>
    where
        F: FnOnce(&mut Group),
    {
        if self.shutting_down {
            return Err(ConductorError::ShuttingDown);
        }
        self.with_group(rundown_id, group_id, |c, g| {
            edit(g);
            c.on_group_edited(g, now)
        })
    }

    /// Read-only playhead of a group.
    pub fn sample_group(
        &self,
        rundown_id: &str,
        group_id: &str,
        now: Timestamp,
    ) -> Result<PlayState, ConductorError> {
        let rundown = self.store.get_rundown(rundown_id)?;
        let group = rundown
            .group(group_id)
            .ok_or_else(|| StoreError::GroupNotFound {
                rundown_id: rundown_id.to_string(),
                group_id: group_id.to_string(),
            })?;
        Ok(project_group(group, now))
    }

    /// Run whatever the timers say is due.
    pub fn tick(&mut self, now: Timestamp) {
        if self.shutting_down {
            return;
        }

        if let Some(batch) = self.resource_batch.take_due(now) {
            if !batch.is_empty() {
                self.observer.notify(Notification::ResourcesUpdated(batch));
            }
        }

        if let Some(coalesced) = self.autofill_trigger.due(now) {
            log_checks!(self.verbosity, "Auto-fill pass for {} trigger(s)", coalesced);
            self.handle_autofill(now);
        }

        match self.auto_refresh.poll(now) {
            RefreshDecision::Refresh => self.refresh_resources(now),
            RefreshDecision::Skip => {
                log_checks!(self.verbosity, "Skipping auto-refresh, a device is still refreshing")
            }
            RefreshDecision::Idle => {}
        }

        self.sample_for_auto_stop(now);
    }

    /// Mirror matching resources into every auto-filled group.
    pub fn handle_autofill(&mut self, now: Timestamp) {
        let project = self.store.get_project().clone();
        let mut added = 0;
        let mut removed = 0;

        for mut rundown in self.cloned_rundowns() {
            let mut changed: Vec<GroupId> = Vec::new();
            let rundown_id = rundown.id.clone();

            for group in &mut rundown.groups {
                if !group.auto_fill.enabled {
                    continue;
                }
                let matching = find_autofill_resources(
                    &project,
                    &group.auto_fill.rule,
                    self.store.get_resources(),
                );
                let outcome = self.reconciler.reconcile(group, &matching);

                for conflict in outcome.conflicts.iter().cloned() {
                    self.observer.notify(Notification::ReconciliationConflict {
                        group_id: group.id.clone(),
                        conflict,
                    });
                }
                if !outcome.changed() {
                    continue;
                }

                added += outcome.added;
                removed += outcome.removed;
                group.parts = outcome.parts;
                if let Err(err) = self.controller_for(&rundown_id).on_group_edited(group, now) {
                    self.report_failure(group, &err);
                }
                changed.push(group.id.clone());
            }

            if !changed.is_empty() {
                self.commit(rundown, &changed);
            }
        }

        if added > 0 || removed > 0 {
            log_changes!(
                self.verbosity,
                "Auto-fill: {} part(s) added, {} removed",
                added,
                removed
            );
        }
    }

    /// Drop resources of devices that are gone, then ask for a fresh report.
    pub fn refresh_resources(&mut self, now: Timestamp) {
        let devices = &self.store.get_project().devices;
        let orphaned: Vec<String> = self
            .store
            .get_resources()
            .values()
            .filter(|r| !devices.contains(&r.device_id))
            .map(|r| r.id.clone())
            .collect();
        for id in orphaned {
            self.on_resource_updated(&id, None, now);
        }

        if let Err(err) = self.gateway.refresh_resources() {
            log::warn!("Resource refresh not delivered: {}", err);
            self.observer.notify(Notification::TransportUnavailable {
                group_id: None,
                reason: err.to_string(),
            });
        }
    }

    /// Stop all periodic work. Pending batches and passes are dropped.
    pub fn begin_shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        self.autofill_trigger.cancel();
        self.resource_batch.cancel();
        self.auto_refresh.cancel();
        log_changes!(self.verbosity, "Conductor shutting down");
    }

    /// Sample running groups in place; only rundowns with a group to stop
    /// are copied and written back.
    fn sample_for_auto_stop(&mut self, now: Timestamp) {
        let mut due: Vec<(String, Vec<GroupId>)> = Vec::new();
        for (rundown_id, controller) in self.controllers.iter_mut() {
            let running = controller.running_groups();
            if running.is_empty() {
                continue;
            }
            let Ok(rundown) = self.store.get_rundown(rundown_id) else {
                continue;
            };
            let stopping: Vec<GroupId> = running
                .into_iter()
                .filter(|id| {
                    rundown
                        .group(id)
                        .map_or(false, |g| controller.observe(g, now).auto_stopped)
                })
                .collect();
            if !stopping.is_empty() {
                due.push((rundown_id.clone(), stopping));
            }
        }
        due.sort();

        for (rundown_id, stopped) in due {
            let Ok(rundown) = self.store.get_rundown(&rundown_id) else {
                continue;
            };
            let mut rundown = rundown.clone();
            let controller = self.controller_for(&rundown_id);
            for group_id in &stopped {
                if let Some(group) = rundown.group_mut(group_id) {
                    log::warn!("Group {} reached its end, stopping", group_id);
                    controller.stop(group);
                }
            }
            self.commit(rundown, &stopped);
            for group_id in stopped {
                self.observer
                    .notify(Notification::GroupAutoStopped { group_id });
            }
        }
    }

    /// Run a controller transition on a stored group and write it back.
    fn with_group<F>(&mut self, rundown_id: &str, group_id: &str, f: F) -> Result<(), ConductorError>
    where
        F: FnOnce(&mut GroupPlayoutController, &mut Group) -> Result<(), PlayoutError>,
    {
        let mut rundown = self.store.get_rundown(rundown_id)?.clone();
        let controller = self.controller_for(rundown_id);
        let group = rundown
            .group_mut(group_id)
            .ok_or_else(|| StoreError::GroupNotFound {
                rundown_id: rundown_id.to_string(),
                group_id: group_id.to_string(),
            })?;

        match f(controller, group) {
            Ok(()) => {
                let ids = [group.id.clone()];
                self.commit(rundown, &ids);
                Ok(())
            }
            Err(err @ PlayoutError::InvariantViolation(_)) => {
                // The controller stopped the group; persist that
                self.report_failure(group, &err);
                let ids = [group.id.clone()];
                self.commit(rundown, &ids);
                Err(err.into())
            }
            // Rejected transitions leave the stored group untouched
            Err(err) => Err(err.into()),
        }
    }

    fn report_failure(&self, group: &Group, err: &PlayoutError) {
        self.observer.notify(Notification::GroupFailed {
            group_id: group.id.clone(),
            reason: err.to_string(),
        });
    }

    /// Persist a rundown, tell observers and push the touched groups' plans.
    fn commit(&mut self, rundown: Rundown, group_ids: &[GroupId]) {
        for group_id in group_ids {
            let Some(plan) = rundown
                .group(group_id)
                .and_then(|g| g.prepared_play_data.as_ref())
            else {
                continue;
            };
            if let Err(err) = self.gateway.send_plan(group_id, plan) {
                log::warn!("Plan of group {} not delivered: {}", group_id, err);
                self.observer.notify(Notification::TransportUnavailable {
                    group_id: Some(group_id.clone()),
                    reason: err.to_string(),
                });
            }
        }

        let rundown_id = rundown.id.clone();
        self.observer
            .notify(Notification::RundownChanged(rundown.clone()));
        if let Err(err) = self.store.update_rundown(&rundown_id, rundown) {
            log::error!("Failed to store rundown {}: {}", rundown_id, err);
        }
    }

    fn controller_for(&mut self, rundown_id: &str) -> &mut GroupPlayoutController {
        let (confirm, verbosity) = (self.auto_stop_confirm_samples, self.verbosity);
        self.controllers
            .entry(rundown_id.to_string())
            .or_insert_with(|| GroupPlayoutController::new(confirm, verbosity))
    }

    fn cloned_rundowns(&self) -> Vec<Rundown> {
        self.store
            .get_all_rundowns()
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autofill::autofill_part_id;
    use crate::interfaces::{ChannelObserver, MemoryStore};
    use crate::models::{AutoFillMode, AutoFillRule, AutoFillSettings, Enable, LayerMapping, Part, TimelineObject};
    use crate::playout::PlayoutPhase;
    use crate::timeline::PreparedPlayData;
    use crossbeam_channel::Receiver;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Vec<(String, PreparedPlayData)>,
        refreshes: usize,
        offline: bool,
    }

    impl DeviceGateway for RecordingGateway {
        fn send_plan(&mut self, group_id: &str, plan: &PreparedPlayData) -> Result<(), TransportError> {
            if self.offline {
                return Err(TransportError::Unavailable {
                    device_id: "caspar0".to_string(),
                });
            }
            self.sent.push((group_id.to_string(), plan.clone()));
            Ok(())
        }

        fn refresh_resources(&mut self) -> Result<(), TransportError> {
            if self.offline {
                return Err(TransportError::Unavailable {
                    device_id: "caspar0".to_string(),
                });
            }
            self.refreshes += 1;
            Ok(())
        }
    }

    fn part(id: &str, duration: i64) -> Arc<Part> {
        let mut part = Part::new(id, id);
        part.timeline.push(TimelineObject {
            resource_id: id.to_string(),
            content: serde_json::Value::Null,
            enable: Enable { start: 0, duration },
            layer: "layer-video".to_string(),
        });
        part.resolved_duration = duration;
        Arc::new(part)
    }

    fn project() -> Project {
        let mut project = Project::default();
        project.mappings.insert(
            "layer-video".to_string(),
            LayerMapping {
                device_id: "caspar0".to_string(),
                layer_name: "Video".to_string(),
            },
        );
        project.devices.insert("caspar0".to_string());
        project
    }

    fn rundown() -> Rundown {
        let mut manual = Group::new("g1", "Manual");
        manual.policy.one_at_a_time = true;
        manual.policy.auto_play = true;
        manual.parts = vec![part("p1", 1_000), part("p2", 1_000)];

        let mut filled = Group::new("g2", "Clips");
        filled.auto_fill = AutoFillSettings {
            enabled: true,
            mode: AutoFillMode::Replace,
            rule: AutoFillRule {
                layer_id: "layer-video".to_string(),
                filter: String::new(),
            },
        };

        Rundown {
            id: "rd1".to_string(),
            name: "Show".to_string(),
            groups: vec![manual, filled],
        }
    }

    fn conductor() -> (Conductor<MemoryStore, RecordingGateway>, Receiver<Notification>) {
        let (observer, rx) = ChannelObserver::new();
        let store = MemoryStore::new(project(), vec![rundown()]);
        let mut conductor = Conductor::new(
            store,
            RecordingGateway::default(),
            Box::new(observer),
            &ConductorConfig::default(),
        );
        conductor.rebuild_all_plans(0);
        (conductor, rx)
    }

    fn play(group_id: &str) -> ControlCommand {
        ControlCommand::Play {
            rundown_id: "rd1".to_string(),
            group_id: group_id.to_string(),
            part_id: None,
        }
    }

    fn drain(rx: &Receiver<Notification>) -> Vec<Notification> {
        rx.try_iter().collect()
    }

    fn group<'a>(c: &'a Conductor<MemoryStore, RecordingGateway>, id: &str) -> &'a Group {
        c.store().get_rundown("rd1").unwrap().group(id).unwrap()
    }

    #[test]
    fn test_rebuild_resolves_every_group() {
        let (c, _rx) = conductor();
        assert!(group(&c, "g1").prepared_play_data.is_some());
        assert!(group(&c, "g2").prepared_play_data.is_some());
    }

    #[test]
    fn test_play_persists_and_sends_plan() {
        let (mut c, rx) = conductor();
        drain(&rx);
        c.execute(play("g1"), 10_000).unwrap();

        let state = c.sample_group("rd1", "g1", 10_500).unwrap();
        assert!(state.is_part_playing("p1"));
        assert_eq!(c.gateway().sent.last().unwrap().0, "g1");
        assert!(drain(&rx)
            .iter()
            .any(|n| matches!(n, Notification::RundownChanged(_))));
    }

    #[test]
    fn test_unknown_group() {
        let (mut c, _rx) = conductor();
        let err = c.execute(play("nope"), 0).unwrap_err();
        assert!(matches!(
            err,
            ConductorError::Store(StoreError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn test_resource_burst_runs_one_autofill_pass() {
        let (mut c, rx) = conductor();
        c.tick(1_000);
        drain(&rx);

        for i in 0..20 {
            let id = format!("clip{:02}", i);
            c.on_resource_updated(&id, Some(Resource::new(id.as_str(), "caspar0", id.as_str())), 1_000 + i);
        }
        c.tick(1_050);
        assert!(group(&c, "g2").parts.is_empty());

        c.tick(1_100);
        assert_eq!(group(&c, "g2").parts.len(), 20);
        assert_eq!(group(&c, "g2").parts[0].id, autofill_part_id("g2", "clip00"));

        let notes = drain(&rx);
        let batches: Vec<&Notification> = notes
            .iter()
            .filter(|n| matches!(n, Notification::ResourcesUpdated(_)))
            .collect();
        assert_eq!(batches.len(), 1);
        if let Notification::ResourcesUpdated(updates) = batches[0] {
            assert_eq!(updates.len(), 20);
        }
        let changes = notes
            .iter()
            .filter(|n| matches!(n, Notification::RundownChanged(_)))
            .count();
        assert_eq!(changes, 1);
    }

    #[test]
    fn test_gateway_report_diffs_device_resources() {
        let (mut c, _rx) = conductor();
        c.on_gateway_resources(
            "caspar0",
            vec![Resource::new("a", "caspar0", "A"), Resource::new("b", "caspar0", "B")],
            0,
        );
        c.on_gateway_resources("caspar0", vec![Resource::new("b", "caspar0", "B")], 10);
        let ids = c.store().resource_ids_for_device("caspar0");
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_auto_stop_notifies_once() {
        let (mut c, rx) = conductor();
        c.execute(play("g1"), 0).unwrap();
        drain(&rx);

        c.tick(2_010);
        c.tick(2_030);
        c.tick(2_050);
        let stops = drain(&rx)
            .into_iter()
            .filter(|n| matches!(n, Notification::GroupAutoStopped { .. }))
            .count();
        assert_eq!(stops, 1);
        assert!(!group(&c, "g1").playout.is_active());
    }

    #[test]
    fn test_same_group_id_in_two_rundowns_stops_independently() {
        let (observer, rx) = ChannelObserver::new();
        let mut other = rundown();
        other.id = "rd2".to_string();
        other.groups[0].parts = vec![part("p1", 10_000)];
        let store = MemoryStore::new(project(), vec![rundown(), other]);
        let mut c = Conductor::new(
            store,
            RecordingGateway::default(),
            Box::new(observer),
            &ConductorConfig::default(),
        );
        c.rebuild_all_plans(0);
        c.execute(play("g1"), 0).unwrap();
        c.execute(
            ControlCommand::Play {
                rundown_id: "rd2".to_string(),
                group_id: "g1".to_string(),
                part_id: None,
            },
            0,
        )
        .unwrap();
        drain(&rx);

        c.tick(2_010);
        c.tick(2_030);
        c.tick(2_050);

        let stops = drain(&rx)
            .into_iter()
            .filter(|n| matches!(n, Notification::GroupAutoStopped { .. }))
            .count();
        assert_eq!(stops, 1);
        assert!(!group(&c, "g1").playout.is_active());
        let still_playing = c.store().get_rundown("rd2").unwrap().group("g1").unwrap();
        assert!(still_playing.playout.is_active());
        assert_eq!(c.controllers["rd2"].phase("g1"), PlayoutPhase::Playing);
    }

    #[test]
    fn test_transport_failure_is_not_fatal() {
        let (mut c, rx) = conductor();
        c.gateway_mut().offline = true;
        drain(&rx);

        c.execute(play("g1"), 0).unwrap();
        assert!(group(&c, "g1").playout.is_active());
        assert!(drain(&rx).iter().any(|n| matches!(
            n,
            Notification::TransportUnavailable {
                group_id: Some(_),
                ..
            }
        )));
    }

    #[test]
    fn test_refresh_drops_orphaned_resources() {
        let (mut c, _rx) = conductor();
        c.on_resource_updated("x", Some(Resource::new("x", "gone0", "X")), 0);
        c.on_resource_updated("y", Some(Resource::new("y", "caspar0", "Y")), 0);
        c.execute(ControlCommand::RefreshResources, 10).unwrap();

        assert!(c.store().get_resources().get("x").is_none());
        assert!(c.store().get_resources().get("y").is_some());
        assert_eq!(c.gateway().refreshes, 1);
    }

    #[test]
    fn test_auto_refresh_skips_while_refreshing() {
        let (mut c, _rx) = conductor();
        c.execute(ControlCommand::SetAutoRefreshInterval(Some(1_000)), 0)
            .unwrap();
        c.on_device_refresh_status("caspar0", true, 500);
        c.tick(1_000);
        assert_eq!(c.gateway().refreshes, 0);

        c.on_device_refresh_status("caspar0", false, 1_500);
        c.tick(2_000);
        assert_eq!(c.gateway().refreshes, 1);
    }

    #[test]
    fn test_edit_group_prunes_playout() {
        let (mut c, _rx) = conductor();
        c.execute(play("g1"), 0).unwrap();
        c.edit_group("rd1", "g1", |g| g.parts.clear(), 100).unwrap();
        assert_eq!(c.controllers["rd1"].phase("g1"), PlayoutPhase::Stopped);
    }

    #[test]
    fn test_shutdown_cancels_timers() {
        let (mut c, rx) = conductor();
        c.on_resource_updated("a", Some(Resource::new("a", "caspar0", "A")), 0);
        c.begin_shutdown();
        drain(&rx);

        c.tick(1_000);
        assert!(drain(&rx).is_empty());
        assert!(group(&c, "g2").parts.is_empty());
        assert_eq!(c.execute(play("g1"), 0), Err(ConductorError::ShuttingDown));
    }
}
