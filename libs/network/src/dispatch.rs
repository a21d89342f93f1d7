//! Payload fan-out.
//!
//! Each transport owns one [`SessionDispatcher`] and publishes every
//! decoded payload into it. Consumers subscribe per event kind; slow
//! subscribers lag and drop the oldest events instead of back-pressuring
//! the socket read loop.

use tokio::sync::broadcast;
use tracing::debug;

use codec::Payload;
use types::{CapitalSnapshot, ConnectionStatus, LogRecord, PositionSnapshot};

/// Events buffered per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 1024;

/// Broadcast hub for one transport's decoded event stream.
#[derive(Debug)]
pub struct SessionDispatcher {
    logs: broadcast::Sender<LogRecord>,
    positions: broadcast::Sender<PositionSnapshot>,
    capitals: broadcast::Sender<CapitalSnapshot>,
    io_bytes: broadcast::Sender<Vec<u8>>,
    rewinds: broadcast::Sender<()>,
    status: broadcast::Sender<ConnectionStatus>,
}

impl Default for SessionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionDispatcher {
    pub fn new() -> Self {
        Self {
            logs: broadcast::channel(CHANNEL_CAPACITY).0,
            positions: broadcast::channel(CHANNEL_CAPACITY).0,
            capitals: broadcast::channel(CHANNEL_CAPACITY).0,
            io_bytes: broadcast::channel(CHANNEL_CAPACITY).0,
            rewinds: broadcast::channel(CHANNEL_CAPACITY).0,
            status: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Route one decoded payload to its subscribers.
    ///
    /// Send failures mean nobody is subscribed to that kind right now,
    /// which is normal during startup and teardown.
    pub fn publish(&self, payload: Payload) {
        match payload {
            Payload::Log(record) => {
                let _ = self.logs.send(record);
            }
            Payload::Position(snapshot) => {
                let _ = self.positions.send(snapshot);
            }
            Payload::Capital(snapshot) => {
                let _ = self.capitals.send(snapshot);
            }
            Payload::IoBytes(bytes) => {
                let _ = self.io_bytes.send(bytes);
            }
            Payload::RewindComplete => {
                let _ = self.rewinds.send(());
            }
            Payload::Unknown { tag } => {
                debug!(tag, "discarding payload with unknown tag");
            }
        }
    }

    pub fn publish_status(&self, status: ConnectionStatus) {
        let _ = self.status.send(status);
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogRecord> {
        self.logs.subscribe()
    }

    pub fn subscribe_positions(&self) -> broadcast::Receiver<PositionSnapshot> {
        self.positions.subscribe()
    }

    pub fn subscribe_capitals(&self) -> broadcast::Receiver<CapitalSnapshot> {
        self.capitals.subscribe()
    }

    pub fn subscribe_io_bytes(&self) -> broadcast::Receiver<Vec<u8>> {
        self.io_bytes.subscribe()
    }

    pub fn subscribe_rewinds(&self) -> broadcast::Receiver<()> {
        self.rewinds.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::Severity;

    #[tokio::test]
    async fn payloads_reach_matching_subscribers() {
        let dispatcher = SessionDispatcher::new();
        let mut logs = dispatcher.subscribe_logs();
        let mut io = dispatcher.subscribe_io_bytes();

        dispatcher.publish(Payload::Log(LogRecord {
            severity: Severity::Info,
            message: "risk check passed".to_string(),
            timestamp: Utc::now(),
        }));
        dispatcher.publish(Payload::IoBytes(b"8=FIX".to_vec()));

        assert_eq!(logs.recv().await.unwrap().message, "risk check passed");
        assert_eq!(io.recv().await.unwrap(), b"8=FIX".to_vec());
        // The log subscriber must not see the io event.
        assert!(logs.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let dispatcher = SessionDispatcher::new();
        dispatcher.publish(Payload::RewindComplete);
        dispatcher.publish(Payload::Unknown { tag: b'Z' });
    }

    #[tokio::test]
    async fn status_transitions_are_observable() {
        let dispatcher = SessionDispatcher::new();
        let mut status = dispatcher.subscribe_status();
        dispatcher.publish_status(ConnectionStatus::Connected {
            endpoint: "127.0.0.1:19083".to_string(),
        });
        assert!(status.recv().await.unwrap().is_connected());
    }
}
