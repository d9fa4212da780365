//! Periodic refresh of the device resource catalog.

use rustc_hash::FxHashMap;

use crate::clock::Timestamp;
use crate::models::DeviceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshDecision {
    Idle,
    /// Interval elapsed but a device is still refreshing.
    Skip,
    Refresh,
}

/// Interval timer that skips cycles while any device is mid-refresh.
#[derive(Clone, Debug)]
pub struct AutoRefresh {
    interval_ms: Option<u64>,
    next_at: Option<Timestamp>,
    /// Device id -> when it reported starting a refresh.
    refreshing: FxHashMap<DeviceId, Timestamp>,
    liveness_ms: i64,
}

impl AutoRefresh {
    pub fn new(liveness_ms: u64) -> Self {
        Self {
            interval_ms: None,
            next_at: None,
            refreshing: FxHashMap::default(),
            liveness_ms: liveness_ms as i64,
        }
    }

    /// Apply the project's interval. An unchanged interval keeps the timer.
    pub fn configure(&mut self, interval_ms: Option<u64>, now: Timestamp) {
        let interval_ms = interval_ms.filter(|&ms| ms > 0);
        if interval_ms == self.interval_ms {
            return;
        }
        self.interval_ms = interval_ms;
        self.next_at = interval_ms.map(|ms| now + ms as i64);
    }

    pub fn set_device_refreshing(&mut self, device_id: &str, refreshing: bool, now: Timestamp) {
        if refreshing {
            self.refreshing.insert(device_id.to_string(), now);
        } else {
            self.refreshing.remove(device_id);
        }
    }

    /// A refresh report older than the liveness window counts as finished.
    pub fn any_refreshing(&self, now: Timestamp) -> bool {
        self.refreshing
            .values()
            .any(|&started| now - started < self.liveness_ms)
    }

    pub fn poll(&mut self, now: Timestamp) -> RefreshDecision {
        let (Some(interval), Some(next_at)) = (self.interval_ms, self.next_at) else {
            return RefreshDecision::Idle;
        };
        if now < next_at {
            return RefreshDecision::Idle;
        }
        self.next_at = Some(now + interval as i64);
        if self.any_refreshing(now) {
            RefreshDecision::Skip
        } else {
            RefreshDecision::Refresh
        }
    }

    /// Stop the timer for good.
    pub fn cancel(&mut self) {
        self.interval_ms = None;
        self.next_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_at.is_some()
    }
}
