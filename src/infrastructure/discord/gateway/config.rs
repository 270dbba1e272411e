use std::time::Duration;

use super::constants::{
    CONNECTION_TIMEOUT, DEFAULT_GATEWAY_URL, GatewayIntents, HANDSHAKE_TIMEOUT,
    MAX_RECONNECT_ATTEMPTS, MAX_SESSION_INVALIDATIONS, RECONNECT_DELAY_BASE, RECONNECT_DELAY_MAX,
};

/// Gateway connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL; version and encoding parameters are appended on connect.
    pub url: String,
    pub intents: GatewayIntents,
    /// Request `zlib-stream` transport compression.
    pub compress: bool,
    /// Consecutive failed connection attempts tolerated before giving up.
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_base: Duration,
    pub reconnect_delay_max: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for Hello and for READY/RESUMED after identify/resume.
    pub handshake_timeout: Duration,
    /// Consecutive session invalidations tolerated before giving up.
    pub max_session_invalidations: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            intents: GatewayIntents::default(),
            compress: true,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_base: RECONNECT_DELAY_BASE,
            reconnect_delay_max: RECONNECT_DELAY_MAX,
            connect_timeout: CONNECTION_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            max_session_invalidations: MAX_SESSION_INVALIDATIONS,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub const fn with_intents(mut self, intents: GatewayIntents) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub const fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_reconnect_delay(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_delay_base = base;
        self.reconnect_delay_max = max;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, handshake: Duration) -> Self {
        self.connect_timeout = connect;
        self.handshake_timeout = handshake;
        self
    }

    #[must_use]
    pub const fn with_max_session_invalidations(mut self, count: u32) -> Self {
        self.max_session_invalidations = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new()
            .with_url("wss://example.test")
            .with_compression(false)
            .with_max_reconnect_attempts(3);

        assert_eq!(config.url, "wss://example.test");
        assert!(!config.compress);
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_delay_base, Duration::from_secs(1));
    }
}
