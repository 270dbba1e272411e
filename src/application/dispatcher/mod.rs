//! Observer registry and event fan-out.

mod event_dispatcher;
mod observer;

pub use event_dispatcher::EventDispatcher;
pub use observer::{EventObserver, ObserverError, ObserverFault, ObserverId};
