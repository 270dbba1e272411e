//! Domain entity definitions.

mod account;
mod channel;
mod guild;
mod message;
mod presence;
mod private_channel;
mod token;
mod user;

pub use account::AccountChanges;
pub use channel::{Channel, ChannelId, ChannelKind};
pub use guild::{Guild, GuildId};
pub use message::{Message, MessageId};
pub use presence::{Presence, PresenceStatus};
pub use private_channel::PrivateChannel;
pub use token::{AuthToken, TokenKind};
pub use user::{User, UserId};
