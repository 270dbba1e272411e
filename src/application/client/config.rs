use std::time::Duration;

use crate::application::cache::TYPING_TIMEOUT;
use crate::infrastructure::discord::{GatewayConfig, RestConfig};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for a [`DiscordClient`](super::DiscordClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub gateway: GatewayConfig,
    pub rest: RestConfig,
    /// How long a typing indicator stays live without a refresh.
    pub typing_timeout: Duration,
    /// Upper bound for `login` to reach a ready session.
    pub login_timeout: Duration,
    /// Ask the REST API for the gateway URL before connecting.
    pub discover_gateway_url: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            rest: RestConfig::default(),
            typing_timeout: TYPING_TIMEOUT,
            login_timeout: LOGIN_TIMEOUT,
            discover_gateway_url: true,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    #[must_use]
    pub fn with_rest(mut self, rest: RestConfig) -> Self {
        self.rest = rest;
        self
    }

    #[must_use]
    pub const fn with_typing_timeout(mut self, timeout: Duration) -> Self {
        self.typing_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Connects to the configured gateway URL as is, skipping discovery.
    #[must_use]
    pub const fn without_gateway_discovery(mut self) -> Self {
        self.discover_gateway_url = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.typing_timeout, Duration::from_secs(10));
        assert!(config.discover_gateway_url);
        assert!(!config.without_gateway_discovery().discover_gateway_url);
    }
}
