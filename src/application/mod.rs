//! Application layer: state mirror, event fan-out, the client facade and use
//! cases.

/// In-memory state mirror.
pub mod cache;
/// Session facade.
pub mod client;
/// Observer registry.
pub mod dispatcher;
mod sink;
/// Use case implementations.
pub mod use_cases;

pub use cache::StateCache;
pub use client::{ClientBuilder, ClientConfig, DiscordClient};
pub use dispatcher::{EventDispatcher, EventObserver, ObserverError, ObserverFault, ObserverId};
pub use sink::SessionEventSink;
pub use use_cases::{ResolveTokenUseCase, ResolvedToken, TokenSource};
