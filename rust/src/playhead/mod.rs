//! Playhead projection: the point-in-time view of what a group is playing.

mod projector;
mod state;

pub use projector::{project, project_group};
pub use state::{PlayState, PlayingPart, UpcomingPart};
