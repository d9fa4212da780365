//! Timers and the single-writer loop around the playout core.

mod batch;
mod conductor;
mod driver;
mod rate_limit;
mod refresh;

pub use batch::UpdateBatcher;
pub use conductor::{Conductor, ConductorError, ControlCommand};
pub use driver::{Command, Driver, DriverHandle};
pub use rate_limit::RateLimiter;
pub use refresh::{AutoRefresh, RefreshDecision};
