//! Contracts of the collaborators around the playout core.
//!
//! The core reads and writes rundown state through [`RundownStore`], hands
//! resolved plans to a [`DeviceGateway`], and reports changes to an
//! [`Observer`]. None of them is called back into the core.

mod gateway;
mod observer;
mod storage;

pub use gateway::{ConnectionMonitor, DeviceGateway, LivenessAction, TransportError};
pub use observer::{ChannelObserver, Notification, NullObserver, Observer};
pub use storage::{MemoryStore, RundownStore, StoreError};
