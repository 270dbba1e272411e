use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    WaitingForHello,
    Identifying,
    Resuming,
    Connected,
    Reconnecting {
        attempt: u32,
    },
    ShuttingDown,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn is_handshaking(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::WaitingForHello | Self::Identifying | Self::Resuming
        )
    }

    #[must_use]
    pub const fn reconnect_attempt(&self) -> Option<u32> {
        if let Self::Reconnecting { attempt } = self {
            Some(*attempt)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::WaitingForHello => write!(f, "Waiting for Hello"),
            Self::Identifying => write!(f, "Identifying"),
            Self::Resuming => write!(f, "Resuming"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting { attempt } => write!(f, "Reconnecting (attempt {attempt})"),
            Self::ShuttingDown => write!(f, "Shutting Down"),
        }
    }
}

/// Latency shared with readers outside the gateway task. `u64::MAX` means unknown.
#[derive(Debug, Clone)]
pub struct LatencyGauge(Arc<AtomicU64>);

impl LatencyGauge {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(u64::MAX)))
    }

    #[must_use]
    pub fn get(&self) -> Option<Duration> {
        match self.0.load(Ordering::Relaxed) {
            u64::MAX => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn set(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX - 1);
        self.0.store(ms, Ordering::Relaxed);
    }
}

impl Default for LatencyGauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection bookkeeping owned by the gateway task.
///
/// State changes are published on a watch channel so the facade can read them
/// without touching the task.
pub struct GatewayState {
    connection: Arc<watch::Sender<ConnectionState>>,
    heartbeat_interval: Option<Duration>,
    last_heartbeat_sent: Option<Instant>,
    awaiting_ack: bool,
    latency: LatencyGauge,
}

impl GatewayState {
    #[must_use]
    pub fn new(connection: Arc<watch::Sender<ConnectionState>>, latency: LatencyGauge) -> Self {
        Self {
            connection,
            heartbeat_interval: None,
            last_heartbeat_sent: None,
            awaiting_ack: false,
            latency,
        }
    }

    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn transition(&self, state: ConnectionState) {
        self.connection.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(from = %current, to = %state, "Gateway state change");
                *current = state;
                true
            }
        });
    }

    /// Clears heartbeat tracking for a new transport.
    pub const fn reset_heartbeat(&mut self) {
        self.heartbeat_interval = None;
        self.last_heartbeat_sent = None;
        self.awaiting_ack = false;
    }

    pub const fn set_heartbeat_interval(&mut self, interval: Duration) {
        self.heartbeat_interval = Some(interval);
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub fn record_heartbeat_sent(&mut self) {
        self.last_heartbeat_sent = Some(Instant::now());
        self.awaiting_ack = true;
    }

    pub fn record_heartbeat_ack(&mut self) {
        if let Some(sent) = self.last_heartbeat_sent {
            self.latency.set(sent.elapsed());
        }
        self.awaiting_ack = false;
    }

    /// True when the last heartbeat has not been acknowledged yet.
    #[must_use]
    pub const fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 3 }.to_string(),
            "Reconnecting (attempt 3)"
        );
        assert!(ConnectionState::Resuming.is_handshaking());
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.reconnect_attempt(),
            Some(2)
        );
    }

    #[test]
    fn test_transitions_are_published() {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        let state = GatewayState::new(Arc::new(tx), LatencyGauge::new());

        state.transition(ConnectionState::Connecting);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
        assert_eq!(state.connection(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_ack_tracking() {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        let mut state = GatewayState::new(Arc::new(tx), LatencyGauge::new());
        assert!(state.latency().is_none());

        state.record_heartbeat_sent();
        assert!(state.is_awaiting_ack());

        tokio::time::advance(Duration::from_millis(40)).await;
        state.record_heartbeat_ack();
        assert!(!state.is_awaiting_ack());
        assert_eq!(state.latency(), Some(Duration::from_millis(40)));
    }
}
