use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use discord_session::application::{EventObserver, ObserverError, ResolveTokenUseCase};
use discord_session::domain::ports::TokenStoragePort;
use discord_session::infrastructure::{AppConfig, CliArgs, KeyringTokenStorage, StorageManager};
use discord_session::{DiscordClient, DispatchEvent, GatewayEvent};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

/// Logs every event the session delivers.
struct EventLogger;

#[async_trait]
impl EventObserver for EventLogger {
    async fn on_event(&self, event: &GatewayEvent) -> Result<(), ObserverError> {
        match event {
            GatewayEvent::Dispatch(DispatchEvent::MessageCreate { message, author }) => {
                info!(
                    channel = %message.channel_id(),
                    author = %author.tag(),
                    content = message.content(),
                    "Message"
                );
            }
            GatewayEvent::Dispatch(DispatchEvent::Ready(ready)) => {
                info!(
                    user = %ready.user.tag(),
                    guilds = ready.guilds.len(),
                    private_channels = ready.private_channels.len(),
                    "Ready"
                );
            }
            GatewayEvent::Reconnecting { attempt } => warn!(attempt, "Reconnecting"),
            GatewayEvent::Error {
                message,
                recoverable,
            } => warn!(%message, recoverable, "Gateway error"),
            other => debug!(event = other.name(), "Event"),
        }
        Ok(())
    }
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = discord_session::VERSION, "Starting {}", discord_session::NAME);

    let token_storage: Arc<dyn TokenStoragePort> = Arc::new(KeyringTokenStorage::new());
    if args.forget_token {
        token_storage.delete_token().await?;
        info!("Stored token removed");
        return Ok(());
    }

    let resolver = ResolveTokenUseCase::new(token_storage).with_bot_prefix(config.bot);
    let resolved = resolver
        .execute(args.token.clone())
        .await?
        .ok_or_else(|| eyre!("no token found; pass --token or set DISCORD_TOKEN"))?;
    info!(source = %resolved.source, "Token resolved");

    let client = DiscordClient::new(resolved.token.clone(), config.client_config())?;
    client.dispatcher().register("event-logger", EventLogger);

    let mut faults = client.dispatcher().faults();
    tokio::spawn(async move {
        loop {
            match faults.recv().await {
                Ok(fault) => warn!(%fault, "Observer fault"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Observer faults dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    client.login().await?;

    if config.save_token
        && let Err(e) = resolver.persist(&resolved).await
    {
        warn!(error = %e, "Could not save token");
    }

    if let Some(user) = client.our_user() {
        info!(
            user = %user.tag(),
            guilds = client.guilds().len(),
            private_channels = client.private_channels().len(),
            latency_ms = ?client.latency().map(|l| l.as_millis()),
            "Session ready, press Ctrl+C to exit"
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    client.logout().await;

    Ok(())
}
