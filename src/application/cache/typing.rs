use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::entities::{ChannelId, UserId};

/// How long a typing notification stays live without a refresh.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TypingEntry {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

impl TypingEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Who is typing where. Expiry is computed from each notification's own
/// timestamp, so an elapsed entry reads as absent without a removal event.
#[derive(Debug, Clone)]
pub struct TypingRegistry {
    channels: HashMap<ChannelId, Vec<TypingEntry>>,
    timeout: TimeDelta,
}

impl TypingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(TYPING_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            channels: HashMap::new(),
            timeout: TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Records a typing notification. An older timestamp never shortens a
    /// newer one, so replays are harmless.
    pub fn start(&mut self, channel_id: ChannelId, user_id: UserId, at: DateTime<Utc>) {
        let expires_at = at
            .checked_add_signed(self.timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entries = self.channels.entry(channel_id).or_default();

        if let Some(existing) = entries.iter_mut().find(|e| e.user_id == user_id) {
            existing.expires_at = existing.expires_at.max(expires_at);
        } else {
            entries.push(TypingEntry {
                user_id,
                expires_at,
            });
        }
    }

    /// Removes a user's entry. Returns whether it was still live.
    pub fn stop(&mut self, channel_id: ChannelId, user_id: UserId, now: DateTime<Utc>) -> bool {
        let Some(entries) = self.channels.get_mut(&channel_id) else {
            return false;
        };
        let live = entries
            .iter()
            .any(|e| e.user_id == user_id && e.is_live(now));
        entries.retain(|e| e.user_id != user_id);
        if entries.is_empty() {
            self.channels.remove(&channel_id);
        }
        live
    }

    pub fn clear_channel(&mut self, channel_id: ChannelId) {
        self.channels.remove(&channel_id);
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Drops elapsed entries.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        for entries in self.channels.values_mut() {
            entries.retain(|e| e.is_live(now));
        }
        self.channels.retain(|_, entries| !entries.is_empty());
    }

    #[must_use]
    pub fn is_typing(&self, channel_id: ChannelId, user_id: UserId, now: DateTime<Utc>) -> bool {
        self.channels
            .get(&channel_id)
            .is_some_and(|entries| entries.iter().any(|e| e.user_id == user_id && e.is_live(now)))
    }

    /// Entries held, live or not.
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    /// Users currently typing in a channel, in the order they started.
    #[must_use]
    pub fn typing_users(&self, channel_id: ChannelId, now: DateTime<Utc>) -> Vec<UserId> {
        self.channels
            .get(&channel_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.is_live(now))
                    .map(|e| e.user_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for TypingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_start_and_expire() {
        let mut registry = TypingRegistry::new();
        let channel = ChannelId(123);

        registry.start(channel, UserId(1), at(0));
        assert!(registry.is_typing(channel, UserId(1), at(9)));
        assert!(!registry.is_typing(channel, UserId(1), at(10)));
        assert!(registry.typing_users(channel, at(11)).is_empty());
    }

    #[test]
    fn test_refresh_extends_expiry() {
        let mut registry = TypingRegistry::new();
        let channel = ChannelId(123);

        registry.start(channel, UserId(1), at(0));
        registry.start(channel, UserId(1), at(5));
        registry.start(channel, UserId(1), at(2));

        assert!(registry.is_typing(channel, UserId(1), at(14)));
        assert_eq!(registry.typing_users(channel, at(0)), vec![UserId(1)]);
    }

    #[test]
    fn test_stop_reports_live_entry() {
        let mut registry = TypingRegistry::new();
        let channel = ChannelId(123);

        registry.start(channel, UserId(1), at(0));
        registry.start(channel, UserId(2), at(0));

        assert!(registry.stop(channel, UserId(1), at(1)));
        assert!(!registry.stop(channel, UserId(1), at(1)));
        assert!(!registry.stop(channel, UserId(2), at(30)));
        assert!(registry.typing_users(channel, at(1)).is_empty());
    }

    #[test]
    fn test_purge_and_clear_channel() {
        let mut registry = TypingRegistry::with_timeout(Duration::from_secs(1));
        let channel = ChannelId(1);
        let other = ChannelId(2);

        registry.start(channel, UserId(1), at(0));
        registry.start(other, UserId(2), at(5));
        registry.purge_expired(at(3));
        assert_eq!(registry.tracked(), 1);
        assert!(registry.typing_users(channel, at(0)).is_empty());
        assert_eq!(registry.typing_users(other, at(5)), vec![UserId(2)]);

        registry.clear_channel(other);
        assert!(!registry.is_typing(other, UserId(2), at(5)));
    }
}
