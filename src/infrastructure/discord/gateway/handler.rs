use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, trace, warn};

use super::codec::EventParser;
use super::config::GatewayConfig;
use super::constants::{GatewayOpcode, connect_url};
use super::error::{GatewayError, GatewayResult};
use super::heartbeat::HeartbeatTimer;
use super::payloads::{GatewayMessage, GatewayPayload};
use super::session::SessionInfo;
use super::state::{ConnectionState, GatewayState};
use super::transport::GatewayTransport;
use crate::domain::entities::{AuthToken, PresenceStatus};
use crate::domain::events::{DispatchEvent, GatewayEvent};
use crate::domain::ports::GatewayEventSink;

/// Resolves once shutdown is requested or its sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Outbound request processed on the connection loop.
#[derive(Debug)]
pub enum GatewayCommand {
    UpdatePresence {
        status: PresenceStatus,
        game: Option<String>,
        reply: oneshot::Sender<GatewayResult<()>>,
    },
}

/// Drives one connection at a time: handshake, heartbeat and frame processing.
///
/// Frames, heartbeat ticks and commands are all handled on this one loop, in
/// arrival order.
pub struct ConnectionHandler {
    transport: Box<dyn GatewayTransport>,
    pub(super) state: GatewayState,
    pub(super) session: SessionInfo,
    token: AuthToken,
    config: GatewayConfig,
    sink: Arc<dyn GatewayEventSink>,
    commands: mpsc::Receiver<GatewayCommand>,
    shutdown: watch::Receiver<bool>,
    reached_connected: bool,
}

impl ConnectionHandler {
    #[must_use]
    pub fn new(
        transport: Box<dyn GatewayTransport>,
        state: GatewayState,
        token: AuthToken,
        config: GatewayConfig,
        sink: Arc<dyn GatewayEventSink>,
        commands: mpsc::Receiver<GatewayCommand>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            state,
            session: SessionInfo::new(),
            token,
            config,
            sink,
            commands,
            shutdown,
            reached_connected: false,
        }
    }

    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Whether the last connection got as far as READY or RESUMED.
    #[must_use]
    pub const fn reached_connected(&self) -> bool {
        self.reached_connected
    }

    pub fn publish(&self, event: GatewayEvent) {
        self.sink.publish(event);
    }

    pub async fn close_transport(&mut self) {
        self.transport.disconnect().await;
        self.state.reset_heartbeat();
    }

    /// Waits out a reconnect delay. Returns false if shutdown was requested meanwhile.
    pub async fn backoff(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => !self.shutdown_requested(),
            () = stop_requested(&mut self.shutdown) => false,
        }
    }

    /// Runs one connection until it fails. `Ok` means shutdown was requested.
    pub async fn run_connection(&mut self) -> GatewayResult<()> {
        self.reached_connected = false;
        self.state.reset_heartbeat();

        let resuming = self.session.can_resume();
        let base = match self.session.resume_url() {
            Some(url) if resuming => url.to_string(),
            _ => self.config.url.clone(),
        };
        let url = connect_url(&base, self.config.compress);

        self.state.transition(ConnectionState::Connecting);
        debug!(url = %url, resuming, "Connecting to gateway");
        timeout(self.config.connect_timeout, self.transport.connect(&url))
            .await
            .map_err(|_| GatewayError::timeout("connection"))??;

        self.state.transition(ConnectionState::WaitingForHello);
        let interval = self.await_hello().await?;
        self.state.set_heartbeat_interval(interval);
        let mut heartbeat = HeartbeatTimer::new(interval);

        if resuming {
            self.send_resume().await?;
        } else {
            self.send_identify().await?;
        }
        let handshake_deadline = Instant::now() + self.config.handshake_timeout;

        loop {
            let connected = self.state.connection().is_connected();
            tokio::select! {
                biased;

                () = stop_requested(&mut self.shutdown) => return Ok(()),

                () = heartbeat.tick() => self.heartbeat().await?,

                () = sleep_until(handshake_deadline), if !connected => {
                    return Err(GatewayError::timeout(if resuming { "RESUMED" } else { "READY" }));
                }

                message = self.transport.receive() => self.handle_message(message?).await?,

                Some(command) = self.commands.recv(), if connected => {
                    self.handle_command(command).await;
                }
            }
        }
    }

    async fn await_hello(&mut self) -> GatewayResult<Duration> {
        let message = timeout(self.config.handshake_timeout, self.transport.receive())
            .await
            .map_err(|_| GatewayError::timeout("Hello"))??;

        if GatewayOpcode::from_u8(message.op) != Some(GatewayOpcode::Hello) {
            return Err(GatewayError::protocol(format!(
                "expected Hello, got opcode {}",
                message.op
            )));
        }

        let hello = EventParser::parse_hello(message.d)?;
        debug!(interval_ms = hello.heartbeat_interval, "Received Hello");
        Ok(Duration::from_millis(hello.heartbeat_interval.max(1)))
    }

    async fn send_identify(&mut self) -> GatewayResult<()> {
        self.state.transition(ConnectionState::Identifying);
        let payload =
            GatewayPayload::identify(self.token.as_str(), self.config.intents, self.config.compress);
        self.transport.send(&payload).await?;
        debug!(intents = self.config.intents.bits(), "Sent Identify");
        Ok(())
    }

    async fn send_resume(&mut self) -> GatewayResult<()> {
        self.state.transition(ConnectionState::Resuming);
        let (Some(session_id), Some(sequence)) =
            (self.session.session_id(), self.session.sequence())
        else {
            return Err(GatewayError::protocol("no session to resume"));
        };
        let payload = GatewayPayload::resume(self.token.as_str(), session_id, sequence);
        debug!(session_id, sequence, "Sent Resume");
        self.transport.send(&payload).await
    }

    async fn heartbeat(&mut self) -> GatewayResult<()> {
        if self.state.is_awaiting_ack() {
            warn!("Heartbeat ACK not received, connection presumed dead");
            return Err(GatewayError::HeartbeatTimeout);
        }
        self.send_heartbeat().await
    }

    async fn send_heartbeat(&mut self) -> GatewayResult<()> {
        let sequence = self.session.sequence();
        self.transport
            .send(&GatewayPayload::heartbeat(sequence))
            .await?;
        self.state.record_heartbeat_sent();
        trace!(sequence = ?sequence, "Sent heartbeat");
        Ok(())
    }

    async fn handle_message(&mut self, message: GatewayMessage) -> GatewayResult<()> {
        self.session.record_sequence(message.s);

        match GatewayOpcode::from_u8(message.op) {
            Some(GatewayOpcode::Dispatch) => {
                let event_type = message.t.unwrap_or_default();
                self.handle_dispatch(&event_type, message.d)
            }
            Some(GatewayOpcode::HeartbeatAck) => {
                self.state.record_heartbeat_ack();
                trace!(latency = ?self.state.latency(), "Heartbeat acknowledged");
                Ok(())
            }
            Some(GatewayOpcode::Heartbeat) => {
                debug!("Gateway requested immediate heartbeat");
                self.send_heartbeat().await
            }
            Some(GatewayOpcode::Reconnect) => {
                info!("Gateway requested reconnect");
                Err(GatewayError::ReconnectRequested)
            }
            Some(GatewayOpcode::InvalidSession) => {
                let resumable = message.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                warn!(resumable, "Session invalidated");
                Err(GatewayError::SessionInvalidated { resumable })
            }
            opcode => {
                debug!(op = message.op, opcode = ?opcode, "Ignoring opcode");
                Ok(())
            }
        }
    }

    fn handle_dispatch(&mut self, event_type: &str, data: Option<Value>) -> GatewayResult<()> {
        match event_type {
            "READY" => {
                let session = data.as_ref().and_then(EventParser::ready_session);
                let event = EventParser::parse_dispatch(event_type, data)?;
                let Some((session_id, resume_url)) = session else {
                    return Err(GatewayError::protocol("READY without session id"));
                };
                info!(session_id = %session_id, "Gateway ready");
                self.session.begin(session_id, resume_url);
                self.mark_connected();
                self.sink.publish(GatewayEvent::Dispatch(event));
            }
            "RESUMED" => {
                info!(sequence = ?self.session.sequence(), "Session resumed");
                self.mark_connected();
                self.sink.publish(GatewayEvent::Resumed);
            }
            _ => match EventParser::parse_dispatch(event_type, data) {
                Ok(DispatchEvent::Unknown { event_type }) => {
                    trace!(event = %event_type, "Unhandled dispatch");
                }
                Ok(event) => {
                    trace!(event = event.name(), "Dispatch");
                    self.sink.publish(GatewayEvent::Dispatch(event));
                }
                Err(e) => {
                    warn!(event = event_type, error = %e, "Failed to parse dispatch event");
                }
            },
        }
        Ok(())
    }

    fn mark_connected(&mut self) {
        self.reached_connected = true;
        self.state.transition(ConnectionState::Connected);
    }

    async fn handle_command(&mut self, command: GatewayCommand) {
        match command {
            GatewayCommand::UpdatePresence {
                status,
                game,
                reply,
            } => {
                let idle_since = (status == PresenceStatus::Idle).then(chrono::Utc::now);
                let payload = GatewayPayload::presence(status, game.as_deref(), idle_since);
                let result = self.transport.send(&payload).await;
                debug!(status = %status, ok = result.is_ok(), "Sent presence update");
                let _ = reply.send(result);
            }
        }
    }
}
