use crate::domain::events::GatewayEvent;

/// Receives every event the gateway produces, in receipt order.
///
/// Called from the gateway's processing loop; implementations must not block
/// on slow consumers.
pub trait GatewayEventSink: Send + Sync {
    fn publish(&self, event: GatewayEvent);
}

