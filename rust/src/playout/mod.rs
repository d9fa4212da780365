//! Group playout state machine.

mod controller;
mod state;

pub use controller::{GroupPlayoutController, PlayoutError, SampleOutcome};
pub use state::{PlayoutPhase, StepDirection};
