use std::path::PathBuf;

use clap::Parser;

use super::app_config::LogLevel;

#[derive(Debug, Parser)]
#[command(
    name = "discord-session",
    version,
    about = "Logs into Discord and reports every gateway event",
    long_about = None
)]
pub struct CliArgs {
    /// Account token. Ignored when one is stored in the keyring.
    #[arg(short, long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Treat the token as a bot token.
    #[arg(long)]
    pub bot: bool,

    /// Save the token to the system keyring after a successful login.
    #[arg(long)]
    pub save_token: bool,

    /// Remove the token stored in the system keyring and exit.
    #[arg(long)]
    pub forget_token: bool,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Gateway URL; skips discovery.
    #[arg(long, value_name = "URL")]
    pub gateway_url: Option<String>,

    /// Disable zlib-stream gateway compression.
    #[arg(long)]
    pub no_compress: bool,
}
