//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::application::client::ClientConfig;
use crate::infrastructure::discord::{GatewayConfig, GatewayIntents, RestConfig};

pub(super) const APP_NAME: &str = "discord-session";
pub(super) const APP_QUALIFIER: &str = "com";
pub(super) const APP_ORGANIZATION: &str = "discord-session";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Gateway section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Fixed gateway URL. When unset the URL is discovered over REST.
    #[serde(default)]
    pub url: Option<String>,

    /// Request zlib-stream compression.
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Raw intents bitmask. Unknown bits are dropped.
    #[serde(default)]
    pub intents: Option<u32>,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Upper bound for the reconnect backoff, in seconds.
    #[serde(default = "default_reconnect_delay_max_secs")]
    pub reconnect_delay_max_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: None,
            compress: true,
            intents: None,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_max_secs: default_reconnect_delay_max_secs(),
        }
    }
}

/// REST section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub max_throttle_retries: u32,

    #[serde(default = "default_retries")]
    pub max_server_retries: u32,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_throttle_retries: default_retries(),
            max_server_retries: default_retries(),
        }
    }
}

/// Application configuration, loaded from TOML and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Treat command-line tokens as bot tokens.
    #[serde(default)]
    pub bot: bool,

    /// Save a command-line token to the keyring after a successful login.
    #[serde(default)]
    pub save_token: bool,

    #[serde(default = "default_typing_timeout_secs")]
    pub typing_timeout_secs: u64,

    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub rest: RestSettings,
}

const fn default_true() -> bool {
    true
}

const fn default_max_reconnect_attempts() -> u32 {
    5
}

const fn default_reconnect_delay_max_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_retries() -> u32 {
    3
}

const fn default_typing_timeout_secs() -> u64 {
    10
}

const fn default_login_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if args.bot {
            self.bot = true;
        }
        if args.save_token {
            self.save_token = true;
        }
        if let Some(url) = &args.gateway_url {
            self.gateway.url = Some(url.clone());
        }
        if args.no_compress {
            self.gateway.compress = false;
        }
    }

    /// Library settings derived from this configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let defaults = GatewayConfig::default();
        let mut gateway = GatewayConfig::default()
            .with_compression(self.gateway.compress)
            .with_max_reconnect_attempts(self.gateway.max_reconnect_attempts)
            .with_reconnect_delay(
                defaults.reconnect_delay_base,
                Duration::from_secs(self.gateway.reconnect_delay_max_secs),
            );
        if let Some(bits) = self.gateway.intents {
            gateway = gateway.with_intents(GatewayIntents::from_bits_truncate(bits));
        }

        let mut rest = RestConfig::default()
            .with_request_timeout(Duration::from_secs(self.rest.request_timeout_secs))
            .with_retries(self.rest.max_throttle_retries, self.rest.max_server_retries);
        if let Some(base_url) = &self.rest.base_url {
            rest = rest.with_base_url(base_url.clone());
        }

        let mut config = ClientConfig::default()
            .with_rest(rest)
            .with_typing_timeout(Duration::from_secs(self.typing_timeout_secs))
            .with_login_timeout(Duration::from_secs(self.login_timeout_secs));
        if let Some(url) = &self.gateway.url {
            gateway = gateway.with_url(url.clone());
            config = config.without_gateway_discovery();
        }
        config.with_gateway(gateway)
    }

    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("discord-session.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            bot: false,
            save_token: false,
            typing_timeout_secs: default_typing_timeout_secs(),
            login_timeout_secs: default_login_timeout_secs(),
            gateway: GatewaySettings::default(),
            rest: RestSettings::default(),
        }
    }
}
