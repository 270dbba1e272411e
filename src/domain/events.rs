//! Typed notifications produced by the gateway.

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use crate::domain::entities::{
    Channel, ChannelId, Guild, GuildId, Message, MessageId, Presence, PrivateChannel, User,
    UserId,
};

bitflags! {
    /// Categories an observer can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventCategories: u8 {
        const CONNECTION = 1 << 0;
        const GUILD = 1 << 1;
        const CHANNEL = 1 << 2;
        const USER = 1 << 3;
        const MESSAGE = 1 << 4;
        const TYPING = 1 << 5;
        const PRESENCE = 1 << 6;
    }
}

/// Full state of one guild as delivered by READY or `GUILD_CREATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSnapshot {
    pub guild: Guild,
    pub channels: Vec<Channel>,
    pub members: Vec<User>,
    pub presences: Vec<(UserId, Presence)>,
}

/// Initial sync payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEvent {
    pub session_id: String,
    pub user: User,
    pub guilds: Vec<GuildSnapshot>,
    pub private_channels: Vec<(PrivateChannel, User)>,
}

/// Domain event decoded from a gateway dispatch frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DispatchEvent {
    Ready(Box<ReadyEvent>),
    GuildCreate(Box<GuildSnapshot>),
    GuildUpdate {
        guild_id: GuildId,
        name: String,
        icon: Option<String>,
    },
    GuildDelete {
        guild_id: GuildId,
        /// Outage rather than removal.
        unavailable: bool,
    },
    GuildMemberAdd {
        guild_id: GuildId,
        user: User,
    },
    GuildMemberRemove {
        guild_id: GuildId,
        user_id: UserId,
    },
    ChannelCreate {
        channel: Channel,
    },
    ChannelUpdate {
        channel: Channel,
    },
    ChannelDelete {
        channel_id: ChannelId,
        guild_id: Option<GuildId>,
    },
    PrivateChannelCreate {
        channel: PrivateChannel,
        recipient: User,
    },
    UserUpdate {
        user: User,
    },
    MessageCreate {
        message: Message,
        author: User,
    },
    MessageUpdate {
        message_id: MessageId,
        channel_id: ChannelId,
        content: Option<String>,
        edited_timestamp: Option<DateTime<Utc>>,
    },
    MessageDelete {
        message_id: MessageId,
        channel_id: ChannelId,
    },
    TypingStart {
        channel_id: ChannelId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    /// Raised locally when a typing user's message arrives.
    TypingStop {
        channel_id: ChannelId,
        user_id: UserId,
    },
    PresenceUpdate {
        user_id: UserId,
        guild_id: Option<GuildId>,
        presence: Presence,
    },
    Unknown {
        event_type: String,
    },
}

impl DispatchEvent {
    #[must_use]
    pub const fn category(&self) -> EventCategories {
        match self {
            Self::Ready(_) => EventCategories::CONNECTION,
            Self::GuildCreate(_)
            | Self::GuildUpdate { .. }
            | Self::GuildDelete { .. }
            | Self::GuildMemberAdd { .. }
            | Self::GuildMemberRemove { .. } => EventCategories::GUILD,
            Self::ChannelCreate { .. }
            | Self::ChannelUpdate { .. }
            | Self::ChannelDelete { .. }
            | Self::PrivateChannelCreate { .. } => EventCategories::CHANNEL,
            Self::UserUpdate { .. } => EventCategories::USER,
            Self::MessageCreate { .. }
            | Self::MessageUpdate { .. }
            | Self::MessageDelete { .. } => EventCategories::MESSAGE,
            Self::TypingStart { .. } | Self::TypingStop { .. } => EventCategories::TYPING,
            Self::PresenceUpdate { .. } => EventCategories::PRESENCE,
            Self::Unknown { .. } => EventCategories::empty(),
        }
    }

    /// Gateway event name, as used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ready(_) => "READY",
            Self::GuildCreate(_) => "GUILD_CREATE",
            Self::GuildUpdate { .. } => "GUILD_UPDATE",
            Self::GuildDelete { .. } => "GUILD_DELETE",
            Self::GuildMemberAdd { .. } => "GUILD_MEMBER_ADD",
            Self::GuildMemberRemove { .. } => "GUILD_MEMBER_REMOVE",
            Self::ChannelCreate { .. } | Self::PrivateChannelCreate { .. } => "CHANNEL_CREATE",
            Self::ChannelUpdate { .. } => "CHANNEL_UPDATE",
            Self::ChannelDelete { .. } => "CHANNEL_DELETE",
            Self::UserUpdate { .. } => "USER_UPDATE",
            Self::MessageCreate { .. } => "MESSAGE_CREATE",
            Self::MessageUpdate { .. } => "MESSAGE_UPDATE",
            Self::MessageDelete { .. } => "MESSAGE_DELETE",
            Self::TypingStart { .. } => "TYPING_START",
            Self::TypingStop { .. } => "TYPING_STOP",
            Self::PresenceUpdate { .. } => "PRESENCE_UPDATE",
            Self::Unknown { event_type } => event_type,
        }
    }
}

/// Everything an observer can receive: domain events plus connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Dispatch(DispatchEvent),
    Resumed,
    Reconnecting {
        attempt: u32,
    },
    Disconnected {
        reason: String,
        can_resume: bool,
    },
    Error {
        message: String,
        recoverable: bool,
    },
}

impl GatewayEvent {
    #[must_use]
    pub const fn category(&self) -> EventCategories {
        match self {
            Self::Dispatch(event) => event.category(),
            Self::Resumed
            | Self::Reconnecting { .. }
            | Self::Disconnected { .. }
            | Self::Error { .. } => EventCategories::CONNECTION,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Dispatch(event) => event.name(),
            Self::Resumed => "RESUMED",
            Self::Reconnecting { .. } => "RECONNECTING",
            Self::Disconnected { .. } => "DISCONNECTED",
            Self::Error { .. } => "ERROR",
        }
    }
}

impl From<DispatchEvent> for GatewayEvent {
    fn from(event: DispatchEvent) -> Self {
        Self::Dispatch(event)
    }
}
