//! Wire objects shared by the gateway and the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    Channel, ChannelKind, Guild, Message, Presence, PresenceStatus, PrivateChannel, User, UserId,
};
use crate::domain::events::GuildSnapshot;
use crate::domain::snowflake;

/// Discord user object.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        let user = Self::new(dto.id, dto.username, dto.discriminator).with_bot(dto.bot);
        match dto.avatar {
            Some(avatar) => user.with_avatar(avatar),
            None => user,
        }
    }
}

/// User reference that may carry only an id (presence updates).
#[derive(Debug, Clone, Deserialize)]
pub struct PartialUserDto {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    pub username: Option<String>,
    pub discriminator: Option<String>,
    pub avatar: Option<String>,
}

/// Discord channel object, guild or private.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDto {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub guild_id: Option<u64>,
    pub name: Option<String>,
    #[serde(default)]
    pub position: i32,
    pub topic: Option<String>,
    #[serde(default)]
    pub recipients: Vec<UserDto>,
}

/// Result of converting a channel object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelObject {
    Guild(Channel),
    Private(PrivateChannel, User),
    /// Group DMs and private channels without a recipient are not tracked.
    Untracked,
}

impl ChannelDto {
    /// Converts the wire object, filling in the guild id when the payload
    /// omits it (channels nested inside a guild object).
    #[must_use]
    pub fn into_object(self, parent_guild: Option<u64>) -> ChannelObject {
        let kind = ChannelKind::from(self.kind);
        if kind == ChannelKind::Dm {
            return match self.recipients.into_iter().next() {
                Some(recipient) => {
                    let recipient = User::from(recipient);
                    ChannelObject::Private(PrivateChannel::new(self.id, recipient.id()), recipient)
                }
                None => ChannelObject::Untracked,
            };
        }
        if kind == ChannelKind::GroupDm {
            return ChannelObject::Untracked;
        }

        let mut channel = Channel::new(self.id, self.name.unwrap_or_default(), kind)
            .with_position(self.position);
        if let Some(guild_id) = self.guild_id.or(parent_guild) {
            channel = channel.with_guild(guild_id);
        }
        if let Some(topic) = self.topic {
            channel = channel.with_topic(topic);
        }
        ChannelObject::Guild(channel)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberDto {
    pub user: UserDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityDto {
    pub name: String,
}

/// Presence object as found in READY, `GUILD_CREATE` and `PRESENCE_UPDATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceDto {
    pub user: PartialUserDto,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub status: String,
    pub game: Option<ActivityDto>,
    #[serde(default)]
    pub activities: Vec<ActivityDto>,
}

impl PresenceDto {
    #[must_use]
    pub fn presence(&self) -> Presence {
        let game = self
            .game
            .as_ref()
            .or_else(|| self.activities.first())
            .map(|activity| activity.name.clone());
        Presence::new(PresenceStatus::parse(&self.status), game)
    }
}

/// Guild object as delivered by READY and `GUILD_CREATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildDto {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub owner_id: Option<u64>,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub channels: Vec<ChannelDto>,
    #[serde(default)]
    pub members: Vec<MemberDto>,
    #[serde(default)]
    pub presences: Vec<PresenceDto>,
}

impl From<GuildDto> for GuildSnapshot {
    fn from(dto: GuildDto) -> Self {
        let guild_id = dto.id;
        let channels: Vec<Channel> = dto
            .channels
            .into_iter()
            .filter_map(|c| match c.into_object(Some(guild_id)) {
                ChannelObject::Guild(channel) => Some(channel),
                _ => None,
            })
            .collect();
        let members: Vec<User> = dto.members.into_iter().map(|m| m.user.into()).collect();
        let presences = dto
            .presences
            .iter()
            .map(|p| (UserId(p.user.id), p.presence()))
            .collect();

        let mut guild = Guild::new(guild_id, dto.name)
            .with_channels(channels.iter().map(Channel::id))
            .with_members(members.iter().map(User::id));
        if let Some(icon) = dto.icon {
            guild = guild.with_icon(icon);
        }
        if let Some(owner) = dto.owner_id {
            guild = guild.with_owner(owner);
        }

        Self {
            guild,
            channels,
            members,
            presences,
        }
    }
}

/// Message object returned by create/edit and carried by `MESSAGE_CREATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDto {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
    pub author: UserDto,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub edited_timestamp: Option<DateTime<Utc>>,
}

impl MessageDto {
    /// Splits into the message value and its author.
    #[must_use]
    pub fn into_parts(self) -> (Message, User) {
        let author = User::from(self.author);
        let message = Message::new(
            self.id,
            self.channel_id,
            author.id(),
            self.content,
            self.timestamp,
        );
        let message = match self.edited_timestamp {
            Some(edited) => message.with_edited_timestamp(edited),
            None => message,
        };
        (message, author)
    }
}

/// Discord API error body.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
    /// Seconds, only present on 429 bodies.
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Deserialize)]
pub struct GatewayUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageBody<'a> {
    pub content: &'a str,
    pub tts: bool,
}

#[derive(Debug, Serialize)]
pub struct EditMessageBody<'a> {
    pub content: &'a str,
}

/// `PATCH /users/@me`; absent fields are left unchanged.
#[derive(Debug, Default, Serialize)]
pub struct ModifyCurrentUserBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CreatePrivateChannelBody {
    pub recipient_id: String,
}
