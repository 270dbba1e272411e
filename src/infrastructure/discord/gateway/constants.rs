use std::time::Duration;

use bitflags::bitflags;

pub const GATEWAY_VERSION: u8 = 10;
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

pub const HEARTBEAT_JITTER_PERCENT: f64 = 0.05;

pub const RECONNECT_DELAY_BASE: Duration = Duration::from_secs(1);
pub const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(60);
pub const RECONNECT_JITTER_MAX: Duration = Duration::from_millis(500);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const MAX_FAILED_RESUMES: u32 = 2;
pub const MAX_SESSION_INVALIDATIONS: u32 = 5;

pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub const GATEWAY_COMMANDS_PER_WINDOW: u32 = 120;
pub const GATEWAY_COMMAND_WINDOW: Duration = Duration::from_secs(60);

pub const CLIENT_PROPERTIES_BROWSER: &str = "discord-session";
pub const CLIENT_PROPERTIES_DEVICE: &str = "discord-session";

pub const LARGE_THRESHOLD: u16 = 250;

/// Appends version, encoding and compression query parameters to a gateway base URL.
#[must_use]
pub fn connect_url(base: &str, compress: bool) -> String {
    let mut url = if base.contains('?') {
        format!("{base}&v={GATEWAY_VERSION}&encoding=json")
    } else {
        format!("{}/?v={GATEWAY_VERSION}&encoding=json", base.trim_end_matches('/'))
    };
    if compress {
        url.push_str("&compress=zlib-stream");
    }
    url
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOpcode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    Resume = 6,
    Reconnect = 7,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

impl GatewayOpcode {
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::PresenceUpdate),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

bitflags! {
    /// Event groups requested in the identify payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GatewayIntents: u32 {
        const GUILDS = 1 << 0;
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        const MESSAGE_CONTENT = 1 << 15;
    }
}

impl Default for GatewayIntents {
    fn default() -> Self {
        Self::GUILDS
            | Self::GUILD_MESSAGES
            | Self::GUILD_MESSAGE_TYPING
            | Self::DIRECT_MESSAGES
            | Self::DIRECT_MESSAGE_TYPING
            | Self::MESSAGE_CONTENT
    }
}
