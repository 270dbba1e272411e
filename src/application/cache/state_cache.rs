use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::typing::TypingRegistry;
use crate::domain::entities::{
    Channel, ChannelId, Guild, GuildId, Presence, PrivateChannel, User, UserId,
};
use crate::domain::events::{DispatchEvent, GuildSnapshot, ReadyEvent};

#[derive(Debug, Default)]
struct CacheInner {
    our_user: Option<User>,
    guilds: IndexMap<GuildId, Guild>,
    channels: IndexMap<ChannelId, Channel>,
    users: IndexMap<UserId, User>,
    /// Keyed by recipient.
    private_channels: IndexMap<UserId, PrivateChannel>,
    presences: HashMap<UserId, Presence>,
    typing: TypingRegistry,
}

impl CacheInner {
    fn upsert_user(&mut self, user: &User) {
        self.users.insert(user.id(), user.clone());
        if self.our_user.as_ref().is_some_and(|me| me.id() == user.id()) {
            self.our_user = Some(user.clone());
        }
    }

    fn upsert_private_channel(&mut self, channel: &PrivateChannel, recipient: &User) {
        self.upsert_user(recipient);
        self.private_channels
            .insert(channel.recipient_id(), *channel);
    }

    fn apply_ready(&mut self, ready: &ReadyEvent) {
        let typing = std::mem::take(&mut self.typing);
        *self = Self {
            typing,
            ..Self::default()
        };
        self.typing.clear();

        self.our_user = Some(ready.user.clone());
        self.upsert_user(&ready.user);
        for snapshot in &ready.guilds {
            self.apply_guild(snapshot);
        }
        for (channel, recipient) in &ready.private_channels {
            self.upsert_private_channel(channel, recipient);
        }
        debug!(
            guilds = self.guilds.len(),
            channels = self.channels.len(),
            users = self.users.len(),
            "Cache rebuilt from READY"
        );
    }

    fn apply_guild(&mut self, snapshot: &GuildSnapshot) {
        let guild_id = snapshot.guild.id();
        self.channels
            .retain(|_, channel| !channel.belongs_to(guild_id));
        for channel in &snapshot.channels {
            self.channels.insert(channel.id(), channel.clone());
        }
        for member in &snapshot.members {
            self.upsert_user(member);
        }
        for (user_id, presence) in &snapshot.presences {
            self.presences.insert(*user_id, presence.clone());
        }
        self.guilds.insert(guild_id, snapshot.guild.clone());
    }

    fn remove_guild(&mut self, guild_id: GuildId) {
        self.guilds.shift_remove(&guild_id);
        let removed: Vec<ChannelId> = self
            .channels
            .values()
            .filter(|c| c.belongs_to(guild_id))
            .map(Channel::id)
            .collect();
        for channel_id in removed {
            self.channels.shift_remove(&channel_id);
            self.typing.clear_channel(channel_id);
        }
    }

    fn upsert_channel(&mut self, channel: &Channel) {
        if let Some(guild_id) = channel.guild_id()
            && let Some(guild) = self.guilds.get_mut(&guild_id)
        {
            guild.add_channel(channel.id());
        }
        self.channels.insert(channel.id(), channel.clone());
    }

    fn remove_channel(&mut self, channel_id: ChannelId, guild_id: Option<GuildId>) {
        let guild_id = guild_id.or_else(|| {
            self.channels
                .get(&channel_id)
                .and_then(Channel::guild_id)
        });
        self.channels.shift_remove(&channel_id);
        if let Some(guild) = guild_id.and_then(|id| self.guilds.get_mut(&id)) {
            guild.remove_channel(channel_id);
        }
        self.private_channels
            .retain(|_, private| private.id() != channel_id);
        self.typing.clear_channel(channel_id);
    }

    fn apply(&mut self, event: &DispatchEvent, now: DateTime<Utc>) -> Option<DispatchEvent> {
        match event {
            DispatchEvent::Ready(ready) => self.apply_ready(ready),
            DispatchEvent::GuildCreate(snapshot) => self.apply_guild(snapshot),
            DispatchEvent::GuildUpdate {
                guild_id,
                name,
                icon,
            } => {
                if let Some(guild) = self.guilds.get_mut(guild_id) {
                    guild.set_name(name.clone());
                    guild.set_icon(icon.clone());
                }
            }
            DispatchEvent::GuildDelete { guild_id, .. } => self.remove_guild(*guild_id),
            DispatchEvent::GuildMemberAdd { guild_id, user } => {
                self.upsert_user(user);
                if let Some(guild) = self.guilds.get_mut(guild_id) {
                    guild.add_member(user.id());
                }
            }
            DispatchEvent::GuildMemberRemove { guild_id, user_id } => {
                if let Some(guild) = self.guilds.get_mut(guild_id) {
                    guild.remove_member(*user_id);
                }
            }
            DispatchEvent::ChannelCreate { channel } | DispatchEvent::ChannelUpdate { channel } => {
                self.upsert_channel(channel);
            }
            DispatchEvent::ChannelDelete {
                channel_id,
                guild_id,
            } => self.remove_channel(*channel_id, *guild_id),
            DispatchEvent::PrivateChannelCreate { channel, recipient } => {
                self.upsert_private_channel(channel, recipient);
            }
            DispatchEvent::UserUpdate { user } => self.upsert_user(user),
            DispatchEvent::MessageCreate { message, author } => {
                self.upsert_user(author);
                if self.typing.stop(message.channel_id(), author.id(), now) {
                    return Some(DispatchEvent::TypingStop {
                        channel_id: message.channel_id(),
                        user_id: author.id(),
                    });
                }
            }
            DispatchEvent::TypingStart {
                channel_id,
                user_id,
                timestamp,
            } => {
                self.typing.purge_expired(now);
                self.typing.start(*channel_id, *user_id, *timestamp);
            }
            DispatchEvent::TypingStop {
                channel_id,
                user_id,
            } => {
                self.typing.stop(*channel_id, *user_id, now);
            }
            DispatchEvent::PresenceUpdate {
                user_id, presence, ..
            } => {
                self.presences.insert(*user_id, presence.clone());
            }
            DispatchEvent::MessageUpdate { .. }
            | DispatchEvent::MessageDelete { .. }
            | DispatchEvent::Unknown { .. } => {}
        }
        None
    }
}

/// In-memory mirror of guilds, channels, users and private channels.
///
/// Each event is applied under one write lock, so a reader never sees half
/// an event. Lookups return clones.
#[derive(Debug)]
pub struct StateCache {
    inner: RwLock<CacheInner>,
}

impl StateCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
        }
    }

    #[must_use]
    pub fn with_typing_timeout(timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                typing: TypingRegistry::with_timeout(timeout),
                ..CacheInner::default()
            }),
        }
    }

    /// Applies one gateway event.
    ///
    /// Returns a follow-up event when applying this one implied another, such
    /// as a typing stop caused by the typist's message arriving.
    pub fn apply(&self, event: &DispatchEvent) -> Option<DispatchEvent> {
        trace!(event = event.name(), "Applying event to cache");
        self.inner.write().apply(event, Utc::now())
    }

    /// Drops everything except the typing timeout.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let mut typing = std::mem::take(&mut inner.typing);
        typing.clear();
        *inner = CacheInner {
            typing,
            ..CacheInner::default()
        };
    }

    #[must_use]
    pub fn our_user(&self) -> Option<User> {
        self.inner.read().our_user.clone()
    }

    pub fn set_our_user(&self, user: User) {
        let mut inner = self.inner.write();
        inner.our_user = Some(user.clone());
        inner.upsert_user(&user);
    }

    #[must_use]
    pub fn guild(&self, guild_id: GuildId) -> Option<Guild> {
        self.inner.read().guilds.get(&guild_id).cloned()
    }

    #[must_use]
    pub fn guilds(&self) -> Vec<Guild> {
        self.inner.read().guilds.values().cloned().collect()
    }

    #[must_use]
    pub fn channel(&self, channel_id: ChannelId) -> Option<Channel> {
        self.inner.read().channels.get(&channel_id).cloned()
    }

    /// Channels of one guild, in the guild's channel order.
    #[must_use]
    pub fn guild_channels(&self, guild_id: GuildId) -> Vec<Channel> {
        let inner = self.inner.read();
        inner
            .guilds
            .get(&guild_id)
            .map(|guild| {
                guild
                    .channels()
                    .iter()
                    .filter_map(|id| inner.channels.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.inner.read().users.get(&user_id).cloned()
    }

    #[must_use]
    pub fn private_channel_with(&self, recipient_id: UserId) -> Option<PrivateChannel> {
        self.inner.read().private_channels.get(&recipient_id).copied()
    }

    #[must_use]
    pub fn private_channel(&self, channel_id: ChannelId) -> Option<PrivateChannel> {
        self.inner
            .read()
            .private_channels
            .values()
            .find(|c| c.id() == channel_id)
            .copied()
    }

    #[must_use]
    pub fn private_channels(&self) -> Vec<PrivateChannel> {
        self.inner.read().private_channels.values().copied().collect()
    }

    pub fn upsert_private_channel(&self, channel: &PrivateChannel, recipient: &User) {
        self.inner.write().upsert_private_channel(channel, recipient);
    }

    #[must_use]
    pub fn presence(&self, user_id: UserId) -> Option<Presence> {
        self.inner.read().presences.get(&user_id).cloned()
    }

    pub fn set_presence(&self, user_id: UserId, presence: Presence) {
        self.inner.write().presences.insert(user_id, presence);
    }

    pub fn start_typing(&self, channel_id: ChannelId, user_id: UserId, at: DateTime<Utc>) {
        self.inner.write().typing.start(channel_id, user_id, at);
    }

    /// Returns whether the user was still typing.
    pub fn stop_typing(&self, channel_id: ChannelId, user_id: UserId) -> bool {
        self.inner.write().typing.stop(channel_id, user_id, Utc::now())
    }

    #[must_use]
    pub fn is_typing(&self, channel_id: ChannelId, user_id: UserId) -> bool {
        self.inner
            .read()
            .typing
            .is_typing(channel_id, user_id, Utc::now())
    }

    #[must_use]
    pub fn typing_users(&self, channel_id: ChannelId) -> Vec<UserId> {
        self.inner.read().typing.typing_users(channel_id, Utc::now())
    }

    #[must_use]
    pub fn guild_count(&self) -> usize {
        self.inner.read().guilds.len()
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::domain::entities::{ChannelKind, Message, PresenceStatus};

    fn user(id: u64, name: &str) -> User {
        User::new(id, name, "0001")
    }

    fn text_channel(id: u64, guild: u64, name: &str) -> Channel {
        Channel::new(id, name, ChannelKind::Text).with_guild(guild)
    }

    fn snapshot(id: u64, name: &str, channels: &[u64]) -> GuildSnapshot {
        let channels: Vec<Channel> = channels
            .iter()
            .map(|c| text_channel(*c, id, &format!("c{c}")))
            .collect();
        GuildSnapshot {
            guild: Guild::new(id, name)
                .with_channels(channels.iter().map(Channel::id))
                .with_members([UserId(7)]),
            channels,
            members: vec![user(7, "ferris")],
            presences: vec![(UserId(7), Presence::new(PresenceStatus::Online, None))],
        }
    }

    fn ready(guilds: Vec<GuildSnapshot>) -> DispatchEvent {
        DispatchEvent::Ready(Box::new(ReadyEvent {
            session_id: "s".into(),
            user: user(1, "me"),
            guilds,
            private_channels: vec![(PrivateChannel::new(50_u64, 9_u64), user(9, "bob"))],
        }))
    }

    fn message_from(author: u64, channel: u64) -> DispatchEvent {
        DispatchEvent::MessageCreate {
            message: Message::new(1000, channel, author, "hi", Utc::now()),
            author: user(author, "someone"),
        }
    }

    #[test]
    fn test_ready_populates_cache() {
        let cache = StateCache::new();
        cache.apply(&ready(vec![snapshot(100, "a", &[11, 12]), snapshot(200, "b", &[21])]));

        assert_eq!(cache.our_user().unwrap().id(), UserId(1));
        assert_eq!(cache.guild_count(), 2);
        assert_eq!(cache.channel_count(), 3);
        assert_eq!(cache.user(UserId(7)).unwrap().username(), "ferris");
        assert_eq!(
            cache.presence(UserId(7)).unwrap().status(),
            PresenceStatus::Online
        );
        assert_eq!(cache.private_channel_with(UserId(9)).unwrap().id(), ChannelId(50));
        assert_eq!(cache.private_channel(ChannelId(50)).unwrap().recipient_id(), UserId(9));
    }

    #[test]
    fn test_ready_rebuilds_from_scratch() {
        let cache = StateCache::new();
        cache.apply(&ready(vec![snapshot(100, "a", &[11]), snapshot(200, "b", &[21])]));
        cache.apply(&ready(vec![snapshot(300, "c", &[31])]));

        assert_eq!(cache.guild_count(), 1);
        assert!(cache.guild(GuildId(100)).is_none());
        assert!(cache.channel(ChannelId(11)).is_none());
        assert!(cache.channel(ChannelId(31)).is_some());
    }

    #[test]
    fn test_channel_create_joins_guild() {
        let cache = StateCache::new();
        cache.apply(&ready(vec![snapshot(1, "one", &[11]), snapshot(2, "two", &[21])]));

        cache.apply(&DispatchEvent::ChannelCreate {
            channel: text_channel(12, 1, "new"),
        });

        let guild = cache.guild(GuildId(1)).unwrap();
        assert!(guild.has_channel(ChannelId(12)));
        assert_eq!(cache.guilds().len(), 2);
        assert_eq!(
            cache
                .guild_channels(GuildId(1))
                .iter()
                .map(Channel::name)
                .collect::<Vec<_>>(),
            vec!["c11", "new"]
        );
    }

    #[test]
    fn test_replaying_events_is_idempotent() {
        let events = vec![
            ready(vec![snapshot(1, "one", &[11])]),
            DispatchEvent::GuildCreate(Box::new(snapshot(2, "two", &[21]))),
            DispatchEvent::ChannelCreate {
                channel: text_channel(12, 1, "new"),
            },
            DispatchEvent::GuildMemberAdd {
                guild_id: GuildId(1),
                user: user(8, "crab"),
            },
            DispatchEvent::GuildUpdate {
                guild_id: GuildId(2),
                name: "renamed".into(),
                icon: None,
            },
            DispatchEvent::ChannelDelete {
                channel_id: ChannelId(21),
                guild_id: Some(GuildId(2)),
            },
            DispatchEvent::PresenceUpdate {
                user_id: UserId(8),
                guild_id: Some(GuildId(1)),
                presence: Presence::new(PresenceStatus::Idle, Some("chess".into())),
            },
            DispatchEvent::UserUpdate {
                user: user(1, "me2"),
            },
        ];

        let once = StateCache::new();
        let twice = StateCache::new();
        for event in &events {
            once.apply(event);
            twice.apply(event);
            twice.apply(event);
        }

        assert_eq!(once.guilds(), twice.guilds());
        assert_eq!(once.channel_count(), twice.channel_count());
        assert_eq!(once.user_count(), twice.user_count());
        assert_eq!(once.presence(UserId(8)), twice.presence(UserId(8)));
        assert_eq!(twice.guild(GuildId(1)).unwrap().members(), &[UserId(7), UserId(8)]);
        assert_eq!(twice.guild(GuildId(2)).unwrap().name(), "renamed");
        assert_eq!(twice.our_user().unwrap().username(), "me2");
    }

    #[test]
    fn test_guild_delete_removes_channels() {
        let cache = StateCache::new();
        cache.apply(&ready(vec![snapshot(1, "one", &[11, 12])]));

        cache.apply(&DispatchEvent::GuildDelete {
            guild_id: GuildId(1),
            unavailable: false,
        });

        assert!(cache.guild(GuildId(1)).is_none());
        assert_eq!(cache.channel_count(), 0);
    }

    #[test]
    fn test_channel_delete_unlinks_from_guild() {
        let cache = StateCache::new();
        cache.apply(&ready(vec![snapshot(1, "one", &[11, 12])]));

        cache.apply(&DispatchEvent::ChannelDelete {
            channel_id: ChannelId(11),
            guild_id: None,
        });

        assert!(!cache.guild(GuildId(1)).unwrap().has_channel(ChannelId(11)));
        assert!(cache.channel(ChannelId(11)).is_none());
    }

    #[test]
    fn test_message_clears_author_typing() {
        let cache = StateCache::new();
        cache.apply(&DispatchEvent::TypingStart {
            channel_id: ChannelId(5),
            user_id: UserId(3),
            timestamp: Utc::now(),
        });
        assert!(cache.is_typing(ChannelId(5), UserId(3)));

        let follow_up = cache.apply(&message_from(3, 5));
        assert_eq!(
            follow_up,
            Some(DispatchEvent::TypingStop {
                channel_id: ChannelId(5),
                user_id: UserId(3)
            })
        );
        assert!(!cache.is_typing(ChannelId(5), UserId(3)));
        assert_eq!(cache.apply(&message_from(3, 5)), None);
    }

    #[test]
    fn test_stale_typing_reads_as_absent() {
        let cache = StateCache::new();
        cache.apply(&DispatchEvent::TypingStart {
            channel_id: ChannelId(5),
            user_id: UserId(3),
            timestamp: Utc::now() - TimeDelta::seconds(11),
        });

        assert!(!cache.is_typing(ChannelId(5), UserId(3)));
        assert!(cache.typing_users(ChannelId(5)).is_empty());
        assert_eq!(cache.apply(&message_from(3, 5)), None);
    }

    #[test]
    fn test_typing_start_drops_elapsed_entries() {
        let cache = StateCache::new();
        for user_id in 1..=3_u64 {
            cache.apply(&DispatchEvent::TypingStart {
                channel_id: ChannelId(user_id),
                user_id: UserId(user_id),
                timestamp: Utc::now() - TimeDelta::seconds(30),
            });
        }
        assert_eq!(cache.inner.read().typing.tracked(), 1);

        cache.apply(&DispatchEvent::TypingStart {
            channel_id: ChannelId(9),
            user_id: UserId(9),
            timestamp: Utc::now(),
        });
        assert_eq!(cache.inner.read().typing.tracked(), 1);
        assert!(cache.is_typing(ChannelId(9), UserId(9)));
    }

    #[test]
    fn test_private_channel_is_unique_per_recipient() {
        let cache = StateCache::new();
        let bob = user(9, "bob");
        cache.upsert_private_channel(&PrivateChannel::new(50_u64, 9_u64), &bob);
        cache.apply(&DispatchEvent::PrivateChannelCreate {
            channel: PrivateChannel::new(50_u64, 9_u64),
            recipient: bob,
        });

        assert_eq!(cache.private_channels().len(), 1);
    }

    #[test]
    fn test_clear_keeps_nothing() {
        let cache = StateCache::with_typing_timeout(Duration::from_secs(60));
        cache.apply(&ready(vec![snapshot(1, "one", &[11])]));
        cache.start_typing(ChannelId(11), UserId(1), Utc::now());

        cache.clear();
        assert!(cache.our_user().is_none());
        assert_eq!(cache.guild_count(), 0);
        assert!(!cache.is_typing(ChannelId(11), UserId(1)));
    }
}
