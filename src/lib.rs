//! Discord session library.
//!
//! Keeps one authenticated session alive over the gateway, mirrors guilds,
//! channels, users and private channels in memory, fans events out to
//! observers and runs commands through a rate-limit-aware REST layer.
//!
//! ```no_run
//! use discord_session::{AuthToken, ClientConfig, DiscordClient, EventCategories};
//!
//! # async fn run() -> Result<(), discord_session::ClientError> {
//! let token = AuthToken::new_unchecked("token");
//! let client = DiscordClient::new(token, ClientConfig::default())?;
//! client
//!     .dispatcher()
//!     .register_fn("printer", EventCategories::MESSAGE, |event| println!("{event:?}"));
//! client.login().await?;
//! println!("{} guilds", client.guilds().len());
//! client.logout().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the cache, dispatcher, facade and use cases.
pub mod application;
/// Domain layer containing entities, errors, events and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

pub use application::{ClientConfig, DiscordClient, EventDispatcher, EventObserver, StateCache};
pub use domain::entities::{AuthToken, ChannelId, GuildId, MessageId, UserId};
pub use domain::{ClientError, ClientResult, DispatchEvent, EventCategories, GatewayEvent};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "discord-session";
