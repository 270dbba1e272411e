use std::sync::Arc;

use tracing::trace;

use super::cache::StateCache;
use super::dispatcher::EventDispatcher;
use crate::domain::events::GatewayEvent;
use crate::domain::ports::GatewayEventSink;

/// Gateway sink that commits each event to the cache before observers see it.
pub struct SessionEventSink {
    cache: Arc<StateCache>,
    dispatcher: Arc<EventDispatcher>,
}

impl SessionEventSink {
    #[must_use]
    pub const fn new(cache: Arc<StateCache>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { cache, dispatcher }
    }
}

impl GatewayEventSink for SessionEventSink {
    fn publish(&self, event: GatewayEvent) {
        let follow_up = match &event {
            GatewayEvent::Dispatch(dispatch) => self.cache.apply(dispatch),
            _ => None,
        };
        trace!(event = event.name(), "Publishing event");
        self.dispatcher.dispatch(event);
        if let Some(follow_up) = follow_up {
            self.dispatcher.dispatch(follow_up.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::entities::{ChannelId, Message, MessageId, User, UserId};
    use crate::domain::events::{DispatchEvent, EventCategories};

    #[tokio::test]
    async fn test_cache_is_updated_before_delivery() {
        let cache = Arc::new(StateCache::new());
        let dispatcher = Arc::new(EventDispatcher::new());
        let (_, mut rx) = dispatcher.subscribe(EventCategories::all());
        let sink = SessionEventSink::new(cache.clone(), dispatcher);

        sink.publish(
            DispatchEvent::UserUpdate {
                user: User::new(5_u64, "alice", "0001"),
            }
            .into(),
        );

        assert!(matches!(
            rx.recv().await,
            Some(GatewayEvent::Dispatch(DispatchEvent::UserUpdate { .. }))
        ));
        assert_eq!(cache.user(UserId(5)).map(|u| u.username().to_string()), Some("alice".into()));
    }

    #[tokio::test]
    async fn test_message_from_typist_emits_typing_stop() {
        let cache = Arc::new(StateCache::new());
        let dispatcher = Arc::new(EventDispatcher::new());
        let (_, mut rx) = dispatcher.subscribe(EventCategories::TYPING | EventCategories::MESSAGE);
        let sink = SessionEventSink::new(cache.clone(), dispatcher);
        let now = Utc::now();

        sink.publish(
            DispatchEvent::TypingStart {
                channel_id: ChannelId(3),
                user_id: UserId(5),
                timestamp: now,
            }
            .into(),
        );
        sink.publish(
            DispatchEvent::MessageCreate {
                message: Message::new(MessageId(1), ChannelId(3), UserId(5), "hi", now),
                author: User::new(5_u64, "alice", "0001"),
            }
            .into(),
        );

        assert_eq!(rx.recv().await.map(|e| e.name().to_string()).as_deref(), Some("TYPING_START"));
        assert_eq!(rx.recv().await.map(|e| e.name().to_string()).as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(
            rx.recv().await,
            Some(GatewayEvent::Dispatch(DispatchEvent::TypingStop {
                channel_id: ChannelId(3),
                user_id: UserId(5),
            }))
        );
        assert!(!cache.is_typing(ChannelId(3), UserId(5)));
    }
}
