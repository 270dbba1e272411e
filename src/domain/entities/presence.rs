//! User presence (status and current game).

use serde::{Deserialize, Serialize};

/// Online status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    Invisible,
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Parses a wire status; anything unknown reads as offline.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "online" => Self::Online,
            "idle" => Self::Idle,
            "dnd" => Self::DoNotDisturb,
            "invisible" => Self::Invisible,
            _ => Self::Offline,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::DoNotDisturb => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        !matches!(self, Self::Offline | Self::Invisible)
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence record kept per user by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Presence {
    status: PresenceStatus,
    game: Option<String>,
}

impl Presence {
    #[must_use]
    pub const fn new(status: PresenceStatus, game: Option<String>) -> Self {
        Self { status, game }
    }

    #[must_use]
    pub const fn status(&self) -> PresenceStatus {
        self.status
    }

    /// Name of the game the user is playing, if any.
    #[must_use]
    pub fn game(&self) -> Option<&str> {
        self.game.as_deref()
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.status, PresenceStatus::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_status_parse() {
        assert_eq!(PresenceStatus::parse("online"), PresenceStatus::Online);
        assert_eq!(PresenceStatus::parse("DND"), PresenceStatus::DoNotDisturb);
        assert_eq!(PresenceStatus::parse("weird"), PresenceStatus::Offline);
        assert!(PresenceStatus::Idle.is_online());
        assert!(!PresenceStatus::Invisible.is_online());
    }

    #[test]
    fn test_presence_status_serde_matches_wire() {
        let json = serde_json::to_string(&PresenceStatus::DoNotDisturb).unwrap_or_default();
        assert_eq!(json, "\"dnd\"");
    }
}
