//! Errors surfaced by the client facade.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Failure classification returned by every client operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ClientError {
    /// Streaming transport could not be (re)established within the retry budget.
    #[error("transport failure: {message}")]
    TransportFailure { message: String },

    /// Credentials were rejected during identify. Never retried.
    #[error("authentication failed: {message}")]
    AuthenticationFailure { message: String },

    /// The server kept invalidating the session past the allowed count.
    #[error("session invalidated {attempts} times in a row")]
    SessionInvalidated { attempts: u32 },

    /// A command was rejected with a non-throttling client error.
    #[error("command rejected with status {status}: {message}")]
    CommandRejected { status: u16, message: String },

    /// Throttling persisted past the retry budget.
    #[error("throttled, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    /// Server errors persisted past the retry budget.
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("not connected")]
    NotConnected,

    #[error("already logged in")]
    AlreadyLoggedIn,

    /// No usable credential could be resolved.
    #[error("credentials unavailable: {message}")]
    Credentials { message: String },
}

impl ClientError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::CommandRejected {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
        }
    }

    /// Returns whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. }
                | Self::Throttled { .. }
                | Self::ServiceUnavailable { .. }
                | Self::NotConnected
        )
    }

    /// Returns whether the error ends the session for good.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailure { .. } | Self::SessionInvalidated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ClientError::authentication("bad").is_fatal());
        assert!(!ClientError::rejected(403, "no").is_transient());
        assert!(ClientError::Throttled { retry_after_ms: 5 }.is_transient());
        assert!(ClientError::NotConnected.is_transient());
    }

    #[test]
    fn test_display() {
        let err = ClientError::rejected(50035, "Invalid Form Body");
        assert_eq!(
            err.to_string(),
            "command rejected with status 50035: Invalid Form Body"
        );
    }
}
