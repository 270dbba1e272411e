use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

use super::observer::{EventObserver, FnObserver, ObserverFault, ObserverId};
use crate::domain::events::{EventCategories, GatewayEvent};

const FAULT_CHANNEL_CAPACITY: usize = 64;

enum Delivery {
    /// Drained by a task that runs the observer.
    Observer(mpsc::UnboundedSender<Arc<GatewayEvent>>),
    /// Handed to the subscriber as is.
    Channel(mpsc::UnboundedSender<GatewayEvent>),
}

struct Registration {
    id: ObserverId,
    name: String,
    interests: EventCategories,
    delivery: Delivery,
}

impl Registration {
    /// Queues the event. Returns false once the receiving side is gone.
    fn deliver(&self, event: &Arc<GatewayEvent>) -> bool {
        match &self.delivery {
            Delivery::Observer(queue) => queue.send(event.clone()).is_ok(),
            Delivery::Channel(queue) => queue.send(GatewayEvent::clone(event)).is_ok(),
        }
    }
}

/// Fans events out to registered observers.
///
/// Every observer owns an unbounded queue, so `dispatch` never waits and a
/// slow observer only delays itself. Faults are logged and broadcast on the
/// diagnostics channel.
pub struct EventDispatcher {
    registrations: RwLock<Vec<Registration>>,
    faults: broadcast::Sender<ObserverFault>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        let (faults, _) = broadcast::channel(FAULT_CHANNEL_CAPACITY);
        Self {
            registrations: RwLock::new(Vec::new()),
            faults,
        }
    }

    /// Registers an observer and spawns its delivery task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn register<O: EventObserver>(&self, name: impl Into<String>, observer: O) -> ObserverId {
        let id = ObserverId::new();
        let name = name.into();
        let interests = observer.interests();
        let (queue, mut rx) = mpsc::unbounded_channel::<Arc<GatewayEvent>>();
        let faults = self.faults.clone();
        let task_name = name.clone();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = AssertUnwindSafe(observer.on_event(&event))
                    .catch_unwind()
                    .await;

                let (message, panicked) = match result {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => (e.to_string(), false),
                    Err(panic_info) => {
                        let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                            (*s).to_string()
                        } else if let Some(s) = panic_info.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "Unknown panic".to_string()
                        };
                        (panic_msg, true)
                    }
                };

                let fault = ObserverFault {
                    observer: id,
                    observer_name: task_name.clone(),
                    event: event.name().to_string(),
                    message,
                    panicked,
                };
                if panicked {
                    error!(observer = %task_name, event = %fault.event, error = %fault.message, "Observer panicked");
                } else {
                    warn!(observer = %task_name, event = %fault.event, error = %fault.message, "Observer failed");
                }
                let _ = faults.send(fault);
            }
            debug!(observer = %task_name, "Observer queue closed");
        });

        self.registrations.write().push(Registration {
            id,
            name,
            interests,
            delivery: Delivery::Observer(queue),
        });
        debug!(observer = %id, ?interests, "Observer registered");
        id
    }

    /// Registers a closure as an observer.
    pub fn register_fn<F>(
        &self,
        name: impl Into<String>,
        interests: EventCategories,
        handler: F,
    ) -> ObserverId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.register(name, FnObserver { interests, handler })
    }

    /// Returns a channel that receives every matching event.
    pub fn subscribe(
        &self,
        interests: EventCategories,
    ) -> (ObserverId, mpsc::UnboundedReceiver<GatewayEvent>) {
        let id = ObserverId::new();
        let (queue, rx) = mpsc::unbounded_channel();
        self.registrations.write().push(Registration {
            id,
            name: format!("subscription-{id}"),
            interests,
            delivery: Delivery::Channel(queue),
        });
        (id, rx)
    }

    /// Stops delivery to an observer. Events already queued are still handled.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Diagnostics stream of observer faults.
    #[must_use]
    pub fn faults(&self) -> broadcast::Receiver<ObserverFault> {
        self.faults.subscribe()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.registrations.read().len()
    }

    /// Queues an event for every interested observer.
    pub fn dispatch(&self, event: GatewayEvent) {
        let category = event.category();
        if category.is_empty() {
            return;
        }
        let event = Arc::new(event);
        let mut closed = Vec::new();

        for registration in self.registrations.read().iter() {
            if registration.interests.intersects(category) && !registration.deliver(&event) {
                closed.push(registration.id);
            }
        }

        if !closed.is_empty() {
            let mut registrations = self.registrations.write();
            registrations.retain(|r| {
                let keep = !closed.contains(&r.id);
                if !keep {
                    debug!(observer = %r.name, "Dropping observer with closed queue");
                }
                keep
            });
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::timeout;

    use super::super::observer::ObserverError;
    use super::*;
    use crate::domain::entities::{ChannelId, UserId};
    use crate::domain::events::DispatchEvent;

    fn typing_stop(channel: u64) -> GatewayEvent {
        GatewayEvent::Dispatch(DispatchEvent::TypingStop {
            channel_id: ChannelId(channel),
            user_id: UserId(1),
        })
    }

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        done: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl EventObserver for Recorder {
        async fn on_event(&self, event: &GatewayEvent) -> Result<(), ObserverError> {
            self.seen.lock().push(format!("{event:?}"));
            let _ = self.done.send(());
            Ok(())
        }
    }

    struct Faulty;

    #[async_trait]
    impl EventObserver for Faulty {
        async fn on_event(&self, event: &GatewayEvent) -> Result<(), ObserverError> {
            match event {
                GatewayEvent::Resumed => panic!("boom"),
                _ => Err("cannot handle".into()),
            }
        }
    }

    struct Stalled;

    #[async_trait]
    impl EventObserver for Stalled {
        async fn on_event(&self, _event: &GatewayEvent) -> Result<(), ObserverError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done, mut done_rx) = mpsc::unbounded_channel();
        dispatcher.register("recorder", Recorder { seen: seen.clone(), done });

        let events: Vec<GatewayEvent> = (0..50).map(typing_stop).collect();
        for event in &events {
            dispatcher.dispatch(event.clone());
        }
        for _ in 0..events.len() {
            done_rx.recv().await.unwrap();
        }

        let expected: Vec<String> = events.iter().map(|e| format!("{e:?}")).collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_faulty_observer_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let mut faults = dispatcher.faults();
        let (_, mut rx) = dispatcher.subscribe(EventCategories::all());
        dispatcher.register("faulty", Faulty);

        dispatcher.dispatch(GatewayEvent::Resumed);
        dispatcher.dispatch(typing_stop(1));

        let first = faults.recv().await.unwrap();
        assert!(first.panicked);
        assert_eq!(first.observer_name, "faulty");
        assert_eq!(first.message, "boom");

        let second = faults.recv().await.unwrap();
        assert!(!second.panicked);
        assert_eq!(second.message, "cannot handle");

        assert_eq!(rx.recv().await.unwrap(), GatewayEvent::Resumed);
        assert_eq!(rx.recv().await.unwrap(), typing_stop(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_observer_does_not_delay_others() {
        let dispatcher = EventDispatcher::new();
        dispatcher.register("stalled", Stalled);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done, mut done_rx) = mpsc::unbounded_channel();
        dispatcher.register("recorder", Recorder { seen: seen.clone(), done });
        let started = tokio::time::Instant::now();

        for channel in 0..3 {
            dispatcher.dispatch(typing_stop(channel));
        }
        for _ in 0..3 {
            done_rx.recv().await.unwrap();
        }

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_interest_filter() {
        let dispatcher = EventDispatcher::new();
        let (_, mut typing_rx) = dispatcher.subscribe(EventCategories::TYPING);

        dispatcher.dispatch(GatewayEvent::Resumed);
        dispatcher.dispatch(typing_stop(2));

        assert_eq!(typing_rx.recv().await.unwrap(), typing_stop(2));
        assert!(typing_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_fn_and_unregister() {
        let dispatcher = EventDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = dispatcher.register_fn("closure", EventCategories::CONNECTION, move |event| {
            let _ = tx.send(event.name().to_string());
        });

        dispatcher.dispatch(GatewayEvent::Resumed);
        assert_eq!(rx.recv().await.unwrap(), "RESUMED");

        assert!(dispatcher.unregister(id));
        assert!(!dispatcher.unregister(id));
        dispatcher.dispatch(GatewayEvent::Resumed);

        assert!(timeout(Duration::from_millis(50), rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let dispatcher = EventDispatcher::new();
        let (_, rx) = dispatcher.subscribe(EventCategories::all());
        assert_eq!(dispatcher.observer_count(), 1);

        drop(rx);
        dispatcher.dispatch(GatewayEvent::Resumed);
        assert_eq!(dispatcher.observer_count(), 0);
    }
}
