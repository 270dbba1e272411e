mod gateway_port;
mod token_storage_port;

pub use gateway_port::GatewayEventSink;
pub use token_storage_port::TokenStoragePort;

#[cfg(test)]
pub use token_storage_port::MockTokenStoragePort;
