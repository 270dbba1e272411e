//! Domain layer with core entities, events and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Gateway event types.
pub mod events;
/// Port definitions.
pub mod ports;
/// Snowflake serde helpers.
pub mod snowflake;

pub use entities::{AuthToken, User};
pub use errors::{ClientError, ClientResult};
pub use events::{DispatchEvent, EventCategories, GatewayEvent};
pub use ports::{GatewayEventSink, TokenStoragePort};
