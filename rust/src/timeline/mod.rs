//! Timeline resolution: turns a group's parts and playback policy into an
//! absolute-time execution plan.

mod part_timing;
mod prepared;
mod resolver;

pub use part_timing::part_timing;
pub use prepared::{PreparedPlayData, RepeatingParts, ScheduledPart};
pub use resolver::{effective_mode, resolve, ResolutionError, TimelineResolver};
