use chrono::{DateTime, Utc};
use flate2::{Decompress, FlushDecompress, Status};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::constants::ZLIB_SUFFIX;
use super::error::{GatewayError, GatewayResult};
use super::payloads::{
    GatewayMessage, GuildDeletePayload, GuildMemberAddPayload, GuildMemberRemovePayload,
    GuildUpdatePayload, HelloPayload, MessageCreatePayload, MessageDeletePayload,
    MessageUpdatePayload, ReadyPayload, TypingStartPayload,
};
use crate::domain::entities::{ChannelId, GuildId, MessageId, User, UserId};
use crate::domain::events::{DispatchEvent, GuildSnapshot, ReadyEvent};
use crate::infrastructure::discord::dto::{ChannelDto, ChannelObject, GuildDto, PresenceDto, UserDto};

const CHUNK_SIZE: usize = 32 * 1024;
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Inflater for the `zlib-stream` transport compression.
///
/// One zlib context spans the whole connection; a frame is complete once the
/// buffered input ends with the sync-flush suffix.
pub struct ZlibStream {
    inflater: Decompress,
    pending: Vec<u8>,
}

impl ZlibStream {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflater: Decompress::new(true),
            pending: Vec::with_capacity(4096),
        }
    }

    /// Buffers a binary frame and returns the decoded text once a full message is available.
    pub fn push(&mut self, data: &[u8]) -> GatewayResult<Option<String>> {
        self.pending.extend_from_slice(data);
        if !self.pending.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let input = std::mem::take(&mut self.pending);
        let mut output = Vec::with_capacity(CHUNK_SIZE);
        let mut consumed = 0;

        loop {
            if output.len() == output.capacity() {
                if output.capacity() >= MAX_MESSAGE_SIZE {
                    return Err(GatewayError::decompression("message exceeds maximum size"));
                }
                output.reserve(CHUNK_SIZE);
            }

            let before = self.inflater.total_in();
            let produced_before = output.len();
            let status = self
                .inflater
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)
                .map_err(|e| GatewayError::decompression(e.to_string()))?;
            let read = usize::try_from(self.inflater.total_in() - before).unwrap_or(0);
            consumed += read;

            match status {
                Status::StreamEnd => break,
                _ if consumed >= input.len() && output.len() < output.capacity() => break,
                Status::BufError if read == 0 && output.len() == produced_before => {
                    return Err(GatewayError::decompression("inflater made no progress"));
                }
                Status::Ok | Status::BufError => {}
            }
        }

        String::from_utf8(output)
            .map(Some)
            .map_err(|e| GatewayError::decompression(format!("invalid UTF-8: {e}")))
    }

    pub fn reset(&mut self) {
        self.inflater.reset(true);
        self.pending.clear();
    }
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<T: DeserializeOwned>(event: &str, data: Value) -> GatewayResult<T> {
    serde_json::from_value(data).map_err(|e| GatewayError::decode(format!("{event}: {e}")))
}

/// Turns raw frames into typed events.
pub struct EventParser;

impl EventParser {
    pub fn parse_message(json: &str) -> GatewayResult<GatewayMessage> {
        serde_json::from_str(json).map_err(|e| GatewayError::decode(e.to_string()))
    }

    pub fn parse_hello(data: Option<Value>) -> GatewayResult<HelloPayload> {
        let data = data.ok_or_else(|| GatewayError::protocol("Hello without data"))?;
        decode("HELLO", data)
    }

    /// Extracts the session id and resume URL from a READY payload.
    #[must_use]
    pub fn ready_session(data: &Value) -> Option<(String, Option<String>)> {
        let session_id = data.get("session_id")?.as_str()?.to_string();
        let resume_url = data
            .get("resume_gateway_url")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Some((session_id, resume_url))
    }

    pub fn parse_dispatch(event_type: &str, data: Option<Value>) -> GatewayResult<DispatchEvent> {
        let data = data.ok_or_else(|| GatewayError::protocol("dispatch without data"))?;

        match event_type {
            "READY" => Self::parse_ready(data),
            "GUILD_CREATE" => {
                let guild: GuildDto = decode(event_type, data)?;
                if guild.unavailable {
                    return Ok(DispatchEvent::GuildDelete {
                        guild_id: GuildId(guild.id),
                        unavailable: true,
                    });
                }
                Ok(DispatchEvent::GuildCreate(Box::new(guild.into())))
            }
            "GUILD_UPDATE" => {
                let update: GuildUpdatePayload = decode(event_type, data)?;
                Ok(DispatchEvent::GuildUpdate {
                    guild_id: GuildId(update.id),
                    name: update.name,
                    icon: update.icon,
                })
            }
            "GUILD_DELETE" => {
                let delete: GuildDeletePayload = decode(event_type, data)?;
                Ok(DispatchEvent::GuildDelete {
                    guild_id: GuildId(delete.id),
                    unavailable: delete.unavailable,
                })
            }
            "GUILD_MEMBER_ADD" => {
                let add: GuildMemberAddPayload = decode(event_type, data)?;
                Ok(DispatchEvent::GuildMemberAdd {
                    guild_id: GuildId(add.guild_id),
                    user: add.user.into(),
                })
            }
            "GUILD_MEMBER_REMOVE" => {
                let remove: GuildMemberRemovePayload = decode(event_type, data)?;
                Ok(DispatchEvent::GuildMemberRemove {
                    guild_id: GuildId(remove.guild_id),
                    user_id: UserId(remove.user.id),
                })
            }
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => {
                let dto: ChannelDto = decode(event_type, data)?;
                Ok(match dto.into_object(None) {
                    ChannelObject::Guild(channel) if event_type == "CHANNEL_CREATE" => {
                        DispatchEvent::ChannelCreate { channel }
                    }
                    ChannelObject::Guild(channel) => DispatchEvent::ChannelUpdate { channel },
                    ChannelObject::Private(channel, recipient) => {
                        DispatchEvent::PrivateChannelCreate { channel, recipient }
                    }
                    ChannelObject::Untracked => DispatchEvent::Unknown {
                        event_type: event_type.to_string(),
                    },
                })
            }
            "CHANNEL_DELETE" => {
                let dto: ChannelDto = decode(event_type, data)?;
                Ok(DispatchEvent::ChannelDelete {
                    channel_id: ChannelId(dto.id),
                    guild_id: dto.guild_id.map(GuildId),
                })
            }
            "USER_UPDATE" => {
                let user: UserDto = decode(event_type, data)?;
                Ok(DispatchEvent::UserUpdate { user: user.into() })
            }
            "MESSAGE_CREATE" => {
                let message: MessageCreatePayload = decode(event_type, data)?;
                let (message, author) = message.into_parts();
                Ok(DispatchEvent::MessageCreate { message, author })
            }
            "MESSAGE_UPDATE" => {
                let update: MessageUpdatePayload = decode(event_type, data)?;
                Ok(DispatchEvent::MessageUpdate {
                    message_id: MessageId(update.id),
                    channel_id: ChannelId(update.channel_id),
                    content: update.content,
                    edited_timestamp: update.edited_timestamp,
                })
            }
            "MESSAGE_DELETE" => {
                let delete: MessageDeletePayload = decode(event_type, data)?;
                Ok(DispatchEvent::MessageDelete {
                    message_id: MessageId(delete.id),
                    channel_id: ChannelId(delete.channel_id),
                })
            }
            "TYPING_START" => {
                let typing: TypingStartPayload = decode(event_type, data)?;
                let timestamp = DateTime::<Utc>::from_timestamp(typing.timestamp, 0)
                    .unwrap_or_else(Utc::now);
                Ok(DispatchEvent::TypingStart {
                    channel_id: ChannelId(typing.channel_id),
                    user_id: UserId(typing.user_id),
                    timestamp,
                })
            }
            "PRESENCE_UPDATE" => {
                let presence: PresenceDto = decode(event_type, data)?;
                Ok(DispatchEvent::PresenceUpdate {
                    user_id: UserId(presence.user.id),
                    guild_id: presence.guild_id.map(GuildId),
                    presence: presence.presence(),
                })
            }
            _ => Ok(DispatchEvent::Unknown {
                event_type: event_type.to_string(),
            }),
        }
    }

    fn parse_ready(data: Value) -> GatewayResult<DispatchEvent> {
        let ready: ReadyPayload = decode("READY", data)?;

        let guilds: Vec<GuildSnapshot> = ready
            .guilds
            .into_iter()
            .filter(|g| !g.unavailable)
            .map(GuildSnapshot::from)
            .collect();
        let private_channels = ready
            .private_channels
            .into_iter()
            .filter_map(|c| match c.into_object(None) {
                ChannelObject::Private(channel, recipient) => Some((channel, recipient)),
                _ => None,
            })
            .collect();

        Ok(DispatchEvent::Ready(Box::new(ReadyEvent {
            session_id: ready.session_id,
            user: User::from(ready.user),
            guilds,
            private_channels,
        })))
    }
}
