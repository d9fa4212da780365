//! Rust implementation of the rundown playout scheduling core.
//!
//! This crate turns declarative rundown data into resolved, time-stamped
//! playout plans, projects those plans onto wall-clock time, and keeps
//! auto-filled groups in sync with externally discovered resources.

pub mod autofill;
pub mod clock;
mod config;
pub mod interfaces;
pub mod logging;
mod models;
pub mod playhead;
pub mod playout;
pub mod runtime;
pub mod timeline;

pub use autofill::{
    autofill_part_id, find_autofill_resources, reconcile, AutoFillReconciler, ReconcileOutcome,
    ReconciliationConflict,
};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::ConductorConfig;
pub use models::{
    AutoFillMode, AutoFillRule, AutoFillSettings, DeviceId, Enable, Group, GroupId, LayerMapping,
    Part, PartId, PlaybackMode, PlaybackPolicy, PlayoutState, Project, Resource, ResourceId,
    ResourceUpdate, Rundown, TimelineObject,
};
pub use playhead::{project, project_group, PlayState, PlayingPart, UpcomingPart};
pub use playout::{GroupPlayoutController, PlayoutError, PlayoutPhase, StepDirection};
pub use runtime::{Conductor, ConductorError, ControlCommand, Driver, DriverHandle};
pub use timeline::{resolve, PreparedPlayData, ResolutionError, ScheduledPart, TimelineResolver};
