use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::constants::{
    CLIENT_PROPERTIES_BROWSER, CLIENT_PROPERTIES_DEVICE, GatewayIntents, GatewayOpcode,
    LARGE_THRESHOLD,
};
use crate::domain::entities::PresenceStatus;
use crate::domain::snowflake;
use crate::infrastructure::discord::dto::{
    ChannelDto, GuildDto, MessageDto, PartialUserDto, UserDto,
};

/// Outbound gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Value,
}

impl GatewayPayload {
    #[must_use]
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: GatewayOpcode::Heartbeat.as_u8(),
            d: sequence.map_or(Value::Null, |s| Value::Number(s.into())),
        }
    }

    #[must_use]
    pub fn identify(token: &str, intents: GatewayIntents, compress: bool) -> Self {
        Self {
            op: GatewayOpcode::Identify.as_u8(),
            d: json!({
                "token": token,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": CLIENT_PROPERTIES_BROWSER,
                    "device": CLIENT_PROPERTIES_DEVICE,
                },
                "compress": compress,
                "large_threshold": LARGE_THRESHOLD,
                "intents": intents.bits(),
            }),
        }
    }

    #[must_use]
    pub fn resume(token: &str, session_id: &str, sequence: u64) -> Self {
        Self {
            op: GatewayOpcode::Resume.as_u8(),
            d: json!({
                "token": token,
                "session_id": session_id,
                "seq": sequence,
            }),
        }
    }

    /// Presence update; `idle_since` is set when the status is idle.
    #[must_use]
    pub fn presence(
        status: PresenceStatus,
        game: Option<&str>,
        idle_since: Option<DateTime<Utc>>,
    ) -> Self {
        let activities: Vec<Value> = game
            .map(|name| json!({ "name": name, "type": 0 }))
            .into_iter()
            .collect();
        Self {
            op: GatewayOpcode::PresenceUpdate.as_u8(),
            d: json!({
                "since": idle_since.map(|t| t.timestamp_millis()),
                "activities": activities,
                "status": status.as_str(),
                "afk": status == PresenceStatus::Idle,
            }),
        }
    }
}

/// Inbound gateway frame.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    pub d: Option<Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub resume_gateway_url: Option<String>,
    pub user: UserDto,
    #[serde(default)]
    pub guilds: Vec<GuildDto>,
    #[serde(default)]
    pub private_channels: Vec<ChannelDto>,
}

#[derive(Debug, Deserialize)]
pub struct GuildUpdatePayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GuildDeletePayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Deserialize)]
pub struct GuildMemberAddPayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub guild_id: u64,
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
pub struct GuildMemberRemovePayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub guild_id: u64,
    pub user: PartialUserDto,
}

#[derive(Debug, Deserialize)]
pub struct MessageUpdatePayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
    pub content: Option<String>,
    pub edited_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MessageDeletePayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct TypingStartPayload {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub user_id: u64,
    /// Unix seconds.
    pub timestamp: i64,
}

/// `MESSAGE_CREATE` is the message object itself.
pub type MessageCreatePayload = MessageDto;
