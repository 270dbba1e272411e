//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Discord gateway and REST adapters.
pub mod discord;
/// Token storage adapters.
pub mod storage;

pub use config::{AppConfig, CliArgs, LogLevel, StorageManager};
pub use storage::KeyringTokenStorage;
