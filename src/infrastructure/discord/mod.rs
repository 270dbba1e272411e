//! Discord gateway and REST adapters.

mod dto;
pub mod gateway;
pub mod rest;

pub use gateway::{
    ConnectionState, GatewayConfig, GatewayConnection, GatewayError, GatewayIntents,
    GatewayTransport, WebSocketTransport,
};
pub use rest::{
    HttpTransport, RateLimiter, ReqwestTransport, RestConfig, RestError, RestExecutor,
};
