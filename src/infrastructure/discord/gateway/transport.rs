use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use super::codec::{EventParser, ZlibStream};
use super::error::{GatewayError, GatewayResult};
use super::payloads::{GatewayMessage, GatewayPayload};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

/// Framed streaming connection to the gateway.
///
/// `receive` must be cancel safe: the connection loop polls it inside `select!`.
#[async_trait]
pub trait GatewayTransport: Send {
    async fn connect(&mut self, url: &str) -> GatewayResult<()>;
    async fn disconnect(&mut self);
    async fn send(&mut self, payload: &GatewayPayload) -> GatewayResult<()>;
    /// Waits for the next frame. A closed stream is an error.
    async fn receive(&mut self) -> GatewayResult<GatewayMessage>;
    fn is_connected(&self) -> bool;
}

/// WebSocket transport with optional `zlib-stream` decompression.
pub struct WebSocketTransport {
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
    inflater: ZlibStream,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            writer: None,
            reader: None,
            inflater: ZlibStream::new(),
        }
    }

    fn mark_closed(&mut self) {
        self.writer = None;
        self.reader = None;
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayTransport for WebSocketTransport {
    async fn connect(&mut self, url: &str) -> GatewayResult<()> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| GatewayError::connection_failed(e.to_string()))?;

        let (writer, reader) = stream.split();
        self.writer = Some(writer);
        self.reader = Some(reader);
        self.inflater.reset();
        debug!(url, "WebSocket connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        self.reader = None;
        self.inflater.reset();
        debug!("WebSocket connection closed");
    }

    async fn send(&mut self, payload: &GatewayPayload) -> GatewayResult<()> {
        let writer = self.writer.as_mut().ok_or(GatewayError::NotConnected)?;
        let json = serde_json::to_string(payload).map_err(|e| GatewayError::decode(e.to_string()))?;

        writer
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| GatewayError::transport(e.to_string()))
    }

    async fn receive(&mut self) -> GatewayResult<GatewayMessage> {
        loop {
            let reader = self.reader.as_mut().ok_or(GatewayError::NotConnected)?;
            match reader.next().await {
                Some(Ok(WsMessage::Binary(data))) => {
                    if let Some(json) = self.inflater.push(&data)? {
                        return EventParser::parse_message(&json);
                    }
                }
                Some(Ok(WsMessage::Text(text))) => return EventParser::parse_message(&text),
                Some(Ok(WsMessage::Close(frame))) => {
                    self.mark_closed();
                    let (code, reason) = frame.map_or_else(
                        || (1000, "no close frame".to_string()),
                        |f| (f.code.into(), f.reason.to_string()),
                    );
                    return Err(GatewayError::ConnectionClosed { code, reason });
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    trace!("Ping from gateway");
                    if let Some(writer) = self.writer.as_mut() {
                        let _ = writer.send(WsMessage::Pong(data)).await;
                    }
                }
                Some(Ok(WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => {
                    self.mark_closed();
                    return Err(GatewayError::transport(e.to_string()));
                }
                None => {
                    self.mark_closed();
                    return Err(GatewayError::ConnectionClosed {
                        code: 1006,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::Notify;
    use tokio::time::{Instant, sleep_until};

    use super::*;

    /// One scripted server action.
    #[derive(Debug, Clone)]
    pub enum Step {
        Frame(Value),
        Close(u16),
        /// Pause before the next step.
        Wait(Duration),
    }

    impl Step {
        pub fn hello(interval_ms: u64) -> Self {
            Self::Frame(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}))
        }

        pub fn dispatch(event: &str, seq: u64, data: Value) -> Self {
            Self::Frame(json!({"op": 0, "t": event, "s": seq, "d": data}))
        }

        pub fn ready(session_id: &str, seq: u64, guilds: Value) -> Self {
            Self::dispatch(
                "READY",
                seq,
                json!({
                    "session_id": session_id,
                    "resume_gateway_url": "wss://resume.test",
                    "user": {"id": "1", "username": "me", "discriminator": "0001"},
                    "guilds": guilds,
                    "private_channels": []
                }),
            )
        }

        pub fn resumed(seq: u64) -> Self {
            Self::dispatch("RESUMED", seq, json!({}))
        }

        pub fn ack() -> Self {
            Self::Frame(json!({"op": 11}))
        }

        pub fn invalid_session(resumable: bool) -> Self {
            Self::Frame(json!({"op": 9, "d": resumable}))
        }

        pub fn reconnect() -> Self {
            Self::Frame(json!({"op": 7, "d": null}))
        }

        pub fn wait_ms(ms: u64) -> Self {
            Self::Wait(Duration::from_millis(ms))
        }
    }

    /// Behaviour of one connection attempt.
    #[derive(Debug, Clone, Default)]
    pub struct Script {
        refuse: bool,
        steps: VecDeque<Step>,
        auto_ack: bool,
    }

    impl Script {
        pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                refuse: false,
                steps: steps.into_iter().collect(),
                auto_ack: false,
            }
        }

        /// Connection attempt fails outright.
        pub fn refuse() -> Self {
            Self {
                refuse: true,
                ..Self::default()
            }
        }

        /// Every heartbeat is acknowledged immediately.
        pub fn auto_ack(mut self) -> Self {
            self.auto_ack = true;
            self
        }
    }

    #[derive(Default)]
    struct Shared {
        scripts: VecDeque<Script>,
        connect_urls: Vec<String>,
        sent: Vec<Vec<GatewayPayload>>,
    }

    /// Inspection handle for a [`ScriptedTransport`] owned by the gateway task.
    #[derive(Clone)]
    pub struct TransportProbe(Arc<Mutex<Shared>>);

    impl TransportProbe {
        pub fn connects(&self) -> usize {
            self.0.lock().connect_urls.len()
        }

        pub fn connect_urls(&self) -> Vec<String> {
            self.0.lock().connect_urls.clone()
        }

        /// Payloads sent on the given connection (0-based).
        pub fn sent(&self, connection: usize) -> Vec<GatewayPayload> {
            self.0.lock().sent.get(connection).cloned().unwrap_or_default()
        }

        pub fn sent_ops(&self, connection: usize) -> Vec<u8> {
            self.sent(connection).iter().map(|p| p.op).collect()
        }

        /// A fresh transport drawing from the same script queue.
        pub fn transport(&self) -> ScriptedTransport {
            ScriptedTransport::with_shared(self.0.clone())
        }
    }

    /// In-memory transport that replays one [`Script`] per connection.
    ///
    /// Once a script runs out, `receive` waits forever, like an idle server.
    pub struct ScriptedTransport {
        shared: Arc<Mutex<Shared>>,
        steps: VecDeque<Step>,
        auto_ack: bool,
        acks: usize,
        wake: Arc<Notify>,
        wait_until: Option<Instant>,
        connected: bool,
    }

    impl ScriptedTransport {
        pub fn new(scripts: impl IntoIterator<Item = Script>) -> (Self, TransportProbe) {
            let shared = Arc::new(Mutex::new(Shared {
                scripts: scripts.into_iter().collect(),
                ..Shared::default()
            }));
            (Self::with_shared(shared.clone()), TransportProbe(shared))
        }

        fn with_shared(shared: Arc<Mutex<Shared>>) -> Self {
            Self {
                shared,
                steps: VecDeque::new(),
                auto_ack: false,
                acks: 0,
                wake: Arc::new(Notify::new()),
                wait_until: None,
                connected: false,
            }
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&mut self, url: &str) -> GatewayResult<()> {
            let mut shared = self.shared.lock();
            shared.connect_urls.push(url.to_string());
            shared.sent.push(Vec::new());
            let script = shared.scripts.pop_front().unwrap_or_else(Script::refuse);
            drop(shared);

            if script.refuse {
                return Err(GatewayError::connection_failed("connection refused"));
            }
            self.steps = script.steps;
            self.auto_ack = script.auto_ack;
            self.acks = 0;
            self.wait_until = None;
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
            self.steps.clear();
        }

        async fn send(&mut self, payload: &GatewayPayload) -> GatewayResult<()> {
            if !self.connected {
                return Err(GatewayError::NotConnected);
            }
            if let Some(sent) = self.shared.lock().sent.last_mut() {
                sent.push(payload.clone());
            }
            if self.auto_ack && payload.op == 1 {
                self.acks += 1;
                self.wake.notify_one();
            }
            Ok(())
        }

        async fn receive(&mut self) -> GatewayResult<GatewayMessage> {
            loop {
                if !self.connected {
                    return Err(GatewayError::NotConnected);
                }
                if self.acks > 0 {
                    self.acks -= 1;
                    return Ok(GatewayMessage {
                        op: 11,
                        d: None,
                        s: None,
                        t: None,
                    });
                }

                match self.steps.front().cloned() {
                    None => self.wake.notified().await,
                    Some(Step::Wait(duration)) => {
                        let deadline = *self
                            .wait_until
                            .get_or_insert_with(|| Instant::now() + duration);
                        let wake = self.wake.clone();
                        tokio::select! {
                            () = sleep_until(deadline) => {
                                self.wait_until = None;
                                self.steps.pop_front();
                            }
                            () = wake.notified() => {}
                        }
                    }
                    Some(Step::Frame(frame)) => {
                        self.steps.pop_front();
                        return serde_json::from_value(frame)
                            .map_err(|e| GatewayError::decode(e.to_string()));
                    }
                    Some(Step::Close(code)) => {
                        self.steps.pop_front();
                        self.connected = false;
                        return Err(GatewayError::ConnectionClosed {
                            code,
                            reason: "scripted close".to_string(),
                        });
                    }
                }
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{ScriptedTransport, Script, Step};
    use super::*;

    #[test]
    fn test_websocket_transport_initial_state() {
        assert!(!WebSocketTransport::new().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_transport_replays_and_records() {
        let (mut transport, probe) = ScriptedTransport::new([
            Script::refuse(),
            Script::new([Step::hello(1000), Step::wait_ms(10), Step::Close(4000)]).auto_ack(),
        ]);

        assert!(transport.connect("wss://a").await.is_err());
        transport.connect("wss://b").await.unwrap();

        assert_eq!(transport.receive().await.unwrap().op, 10);
        transport.send(&GatewayPayload::heartbeat(None)).await.unwrap();
        assert_eq!(transport.receive().await.unwrap().op, 11);

        let closed = transport.receive().await;
        assert_eq!(closed.unwrap_err().close_code(), Some(4000));

        assert_eq!(probe.connects(), 2);
        assert_eq!(probe.sent_ops(1), vec![1]);
    }
}
