use thiserror::Error;

use crate::domain::errors::ClientError;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RestError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("still throttled after {attempts} attempts, retry after {retry_after_ms}ms")]
    Throttled { attempts: u32, retry_after_ms: u64 },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("service unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    #[error("failed to build request: {message}")]
    Request { message: String },

    #[error("executor is closed")]
    Closed,
}

impl RestError {
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Failures worth another attempt with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout | Self::Server { .. }
        )
    }
}

impl From<RestError> for ClientError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Rejected { status, message } => Self::rejected(status, message),
            RestError::Throttled { retry_after_ms, .. } => Self::Throttled { retry_after_ms },
            RestError::Unavailable { .. } | RestError::Server { .. } => {
                Self::unavailable(err.to_string())
            }
            RestError::Closed => Self::NotConnected,
            RestError::Network { .. }
            | RestError::Timeout
            | RestError::Decode { .. }
            | RestError::Request { .. } => Self::transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(RestError::network("reset"), true ; "network")]
    #[test_case(RestError::Timeout, true ; "timeout")]
    #[test_case(RestError::server(502, "bad gateway"), true ; "server")]
    #[test_case(RestError::rejected(403, "missing access"), false ; "rejected")]
    #[test_case(RestError::decode("eof"), false ; "decode")]
    fn test_retryable(err: RestError, retryable: bool) {
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn test_client_error_mapping() {
        assert_eq!(
            ClientError::from(RestError::rejected(403, "missing access")),
            ClientError::rejected(403, "missing access")
        );
        assert_eq!(
            ClientError::from(RestError::rejected(401, "401: Unauthorized")),
            ClientError::rejected(401, "401: Unauthorized")
        );
        assert_eq!(
            ClientError::from(RestError::Throttled {
                attempts: 4,
                retry_after_ms: 2000
            }),
            ClientError::Throttled {
                retry_after_ms: 2000
            }
        );
        assert!(matches!(
            ClientError::from(RestError::Unavailable {
                attempts: 3,
                last_error: "server error 503".into()
            }),
            ClientError::ServiceUnavailable { .. }
        ));
        assert_eq!(ClientError::from(RestError::Closed), ClientError::NotConnected);
    }
}
