//! Streaming gateway session: connection state machine, heartbeat and resume.

mod client;
mod codec;
mod config;
mod constants;
mod error;
mod handler;
mod heartbeat;
mod payloads;
mod session;
mod state;
mod transport;

pub use client::GatewayConnection;
pub use codec::{EventParser, ZlibStream};
pub use config::GatewayConfig;
pub use constants::{
    GATEWAY_COMMAND_WINDOW, GATEWAY_COMMANDS_PER_WINDOW, GatewayIntents, GatewayOpcode,
};
pub use error::{GatewayCloseCode, GatewayError, GatewayResult};
pub use payloads::{GatewayMessage, GatewayPayload};
pub use session::SessionInfo;
pub use state::{ConnectionState, LatencyGauge};
pub use transport::{GatewayTransport, WebSocketTransport};

#[cfg(test)]
pub use transport::mock;
