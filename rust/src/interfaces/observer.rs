//! Change notifications towards observers (UI or any other consumer).

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::autofill::ReconciliationConflict;
use crate::models::{DeviceId, GroupId, ResourceUpdate, Rundown};

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A rundown was written back after the core changed it.
    RundownChanged(Rundown),
    /// Batched resource changes.
    ResourcesUpdated(Vec<ResourceUpdate>),
    DeviceRefreshStatus { device_id: DeviceId, refreshing: bool },
    /// A gateway request was not delivered; playout continues.
    TransportUnavailable {
        group_id: Option<GroupId>,
        reason: String,
    },
    ReconciliationConflict {
        group_id: GroupId,
        conflict: ReconciliationConflict,
    },
    GroupAutoStopped { group_id: GroupId },
    /// The group was stopped after an unrecoverable error.
    GroupFailed { group_id: GroupId, reason: String },
}

/// Narrow callback contract; observers never reach back into the core.
pub trait Observer: Send {
    fn notify(&self, notification: Notification);
}

/// Discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&self, _notification: Notification) {}
}

/// Forwards notifications over a crossbeam channel.
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    sender: Sender<Notification>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl Observer for ChannelObserver {
    fn notify(&self, notification: Notification) {
        // Receiver may be gone during shutdown
        let _ = self.sender.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_delivers_in_order() {
        let (observer, rx) = ChannelObserver::new();
        observer.notify(Notification::GroupAutoStopped {
            group_id: "g1".to_string(),
        });
        observer.notify(Notification::ResourcesUpdated(Vec::new()));

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::GroupAutoStopped {
                group_id: "g1".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), Notification::ResourcesUpdated(Vec::new()));
    }

    #[test]
    fn test_dropped_receiver_is_silent() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.notify(Notification::ResourcesUpdated(Vec::new()));
    }
}
