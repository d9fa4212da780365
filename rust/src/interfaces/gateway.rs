//! Device gateway contract and connection liveness.

use thiserror::Error;

use crate::clock::Timestamp;
use crate::models::DeviceId;
use crate::timeline::PreparedPlayData;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Device {device_id} is unreachable")]
    Unavailable { device_id: DeviceId },
    #[error("Device {device_id} rejected the request: {reason}")]
    Rejected { device_id: DeviceId, reason: String },
}

/// Turns resolved plans into device commands and reports resources back.
///
/// A failed send means the plan was not delivered; playout state is kept.
pub trait DeviceGateway: Send {
    fn send_plan(&mut self, group_id: &str, plan: &PreparedPlayData) -> Result<(), TransportError>;

    /// Ask every device to report its resources again.
    fn refresh_resources(&mut self) -> Result<(), TransportError>;
}

pub const PING_INTERVAL_MS: i64 = 5_000;
pub const RECONNECT_INTERVAL_MS: i64 = 5_000;

/// What the transport should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LivenessAction {
    Idle,
    SendPing,
    /// No ping or pong for too long; the connection is considered dead.
    ConnectionLost,
    Reconnect,
}

/// Ping-based liveness of one gateway connection, without any socket code.
#[derive(Clone, Debug)]
pub struct ConnectionMonitor {
    ping_interval_ms: i64,
    reconnect_interval_ms: i64,
    connected: bool,
    last_ping_received: Timestamp,
    last_ping_sent: Timestamp,
    last_reconnect: Option<Timestamp>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(PING_INTERVAL_MS, RECONNECT_INTERVAL_MS)
    }
}

impl ConnectionMonitor {
    pub fn new(ping_interval_ms: i64, reconnect_interval_ms: i64) -> Self {
        Self {
            ping_interval_ms,
            reconnect_interval_ms,
            connected: false,
            last_ping_received: 0,
            last_ping_sent: 0,
            last_reconnect: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns true when this is a fresh connection.
    pub fn on_connected(&mut self, now: Timestamp) -> bool {
        let was_connected = self.connected;
        self.connected = true;
        self.last_ping_received = now;
        self.last_ping_sent = now;
        self.last_reconnect = None;
        !was_connected
    }

    /// A ping or pong arrived.
    pub fn on_ping(&mut self, now: Timestamp) {
        self.last_ping_received = now;
    }

    pub fn on_disconnected(&mut self, now: Timestamp) {
        self.connected = false;
        self.last_reconnect = Some(now);
    }

    pub fn poll(&mut self, now: Timestamp) -> LivenessAction {
        if !self.connected {
            return match self.last_reconnect {
                Some(last) if now - last < self.reconnect_interval_ms => LivenessAction::Idle,
                _ => {
                    self.last_reconnect = Some(now);
                    LivenessAction::Reconnect
                }
            };
        }

        // Lost after 2.5 ping intervals of silence
        if (now - self.last_ping_received) * 2 > self.ping_interval_ms * 5 {
            self.on_disconnected(now);
            return LivenessAction::ConnectionLost;
        }
        if now - self.last_ping_sent >= self.ping_interval_ms {
            self.last_ping_sent = now;
            return LivenessAction::SendPing;
        }
        LivenessAction::Idle
    }
}
