//! Discord guild entity.

use serde::{Deserialize, Serialize};

use super::{ChannelId, UserId};

/// Unique identifier for a Discord guild (server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuildId(pub u64);

impl GuildId {
    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GuildId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for GuildId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Discord guild (server) as mirrored by the session cache.
///
/// Channel ids keep the order in which the guild announced them; member ids are
/// kept unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guild {
    id: GuildId,
    name: String,
    icon: Option<String>,
    owner_id: Option<UserId>,
    channels: Vec<ChannelId>,
    members: Vec<UserId>,
}

impl Guild {
    /// Creates a new guild with the given ID and name.
    #[must_use]
    pub fn new(id: impl Into<GuildId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            owner_id: None,
            channels: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Sets the guild icon hash.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the guild owner.
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<UserId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Sets the ordered channel list, dropping duplicates.
    #[must_use]
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = ChannelId>) -> Self {
        self.channels.clear();
        for channel in channels {
            self.add_channel(channel);
        }
        self
    }

    /// Sets the member list, dropping duplicates.
    #[must_use]
    pub fn with_members(mut self, members: impl IntoIterator<Item = UserId>) -> Self {
        self.members.clear();
        for member in members {
            self.add_member(member);
        }
        self
    }

    /// Returns the guild ID.
    #[must_use]
    pub const fn id(&self) -> GuildId {
        self.id
    }

    /// Returns the guild name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the guild icon hash.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Returns the guild owner.
    #[must_use]
    pub const fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    /// Returns channel ids in announcement order.
    #[must_use]
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Returns member user ids.
    #[must_use]
    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    /// Returns whether the channel belongs to this guild.
    #[must_use]
    pub fn has_channel(&self, channel_id: ChannelId) -> bool {
        self.channels.contains(&channel_id)
    }

    /// Returns whether the user is a member of this guild.
    #[must_use]
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Renames the guild.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replaces the icon hash.
    pub fn set_icon(&mut self, icon: Option<String>) {
        self.icon = icon;
    }

    /// Appends a channel if it is not already listed.
    pub fn add_channel(&mut self, channel_id: ChannelId) {
        if !self.has_channel(channel_id) {
            self.channels.push(channel_id);
        }
    }

    /// Removes a channel from the list.
    pub fn remove_channel(&mut self, channel_id: ChannelId) {
        self.channels.retain(|id| *id != channel_id);
    }

    /// Adds a member if not already present.
    pub fn add_member(&mut self, user_id: UserId) {
        if !self.has_member(user_id) {
            self.members.push(user_id);
        }
    }

    /// Removes a member.
    pub fn remove_member(&mut self, user_id: UserId) {
        self.members.retain(|id| *id != user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_creation() {
        let guild = Guild::new(123_u64, "Test Server");

        assert_eq!(guild.id().as_u64(), 123);
        assert_eq!(guild.name(), "Test Server");
        assert!(guild.channels().is_empty());
    }

    #[test]
    fn test_add_channel_is_idempotent() {
        let mut guild = Guild::new(1_u64, "g");
        guild.add_channel(ChannelId(10));
        guild.add_channel(ChannelId(11));
        guild.add_channel(ChannelId(10));

        assert_eq!(guild.channels(), &[ChannelId(10), ChannelId(11)]);

        guild.remove_channel(ChannelId(10));
        assert_eq!(guild.channels(), &[ChannelId(11)]);
    }

    #[test]
    fn test_with_members_deduplicates() {
        let guild = Guild::new(1_u64, "g").with_members([UserId(1), UserId(2), UserId(1)]);
        assert_eq!(guild.members().len(), 2);
        assert!(guild.has_member(UserId(2)));
    }

    #[test]
    fn test_guild_id_parse() {
        assert_eq!("42".parse::<GuildId>().ok(), Some(GuildId(42)));
        assert!("abc".parse::<GuildId>().is_err());
    }
}
