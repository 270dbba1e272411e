//! Credential store error types.

use thiserror::Error;

/// Failure talking to the platform credential store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("credential store not available: {0}")]
    NotAvailable(String),

    #[error("failed to read credential: {0}")]
    ReadFailed(String),

    #[error("failed to write credential: {0}")]
    WriteFailed(String),

    #[error("failed to delete credential: {0}")]
    DeleteFailed(String),

    /// Stored value does not look like a token.
    #[error("stored credential is malformed")]
    Malformed,
}

impl From<SecretError> for super::ClientError {
    fn from(err: SecretError) -> Self {
        Self::credentials(err.to_string())
    }
}
