use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::events::{EventCategories, GatewayEvent};

/// Error an observer may return from a handler. It is reported, never
/// propagated.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives dispatched events on its own task, in application order.
#[async_trait]
pub trait EventObserver: Send + Sync + 'static {
    /// Categories this observer wants; everything by default.
    fn interests(&self) -> EventCategories {
        EventCategories::all()
    }

    async fn on_event(&self, event: &GatewayEvent) -> Result<(), ObserverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Report of an observer failing on one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverFault {
    pub observer: ObserverId,
    pub observer_name: String,
    pub event: String,
    pub message: String,
    pub panicked: bool,
}

impl fmt::Display for ObserverFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.panicked { "panicked" } else { "failed" };
        write!(
            f,
            "observer {} {kind} on {}: {}",
            self.observer_name, self.event, self.message
        )
    }
}

/// Adapter for plain closures.
pub(super) struct FnObserver<F> {
    pub(super) interests: EventCategories,
    pub(super) handler: F,
}

#[async_trait]
impl<F> EventObserver for FnObserver<F>
where
    F: Fn(&GatewayEvent) + Send + Sync + 'static,
{
    fn interests(&self) -> EventCategories {
        self.interests
    }

    async fn on_event(&self, event: &GatewayEvent) -> Result<(), ObserverError> {
        (self.handler)(event);
        Ok(())
    }
}
