//! Session facade.

mod config;
mod discord_client;

pub use config::ClientConfig;
pub use discord_client::{ClientBuilder, DiscordClient, GatewayTransportFactory};
