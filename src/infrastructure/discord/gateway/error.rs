use thiserror::Error;

use crate::domain::errors::ClientError;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("connection closed with code {code}: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("session invalidated, resumable: {resumable}")]
    SessionInvalidated { resumable: bool },

    #[error("heartbeat timeout: previous heartbeat was not acknowledged")]
    HeartbeatTimeout,

    #[error("server requested reconnect")]
    ReconnectRequested,

    #[error("decompression error: {message}")]
    Decompression { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("session invalidated {attempts} times in a row")]
    InvalidationLimit { attempts: u32 },

    #[error("not connected to gateway")]
    NotConnected,

    #[error("gateway shutting down")]
    ShuttingDown,
}

impl GatewayError {
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decompression(message: impl Into<String>) -> Self {
        Self::Decompression {
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
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Returns whether the session must end without another connection attempt.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailed { .. }
            | Self::RetriesExhausted { .. }
            | Self::InvalidationLimit { .. }
            | Self::ShuttingDown => true,
            Self::ConnectionClosed { code, .. } => {
                GatewayCloseCode::from_u16(*code).is_some_and(GatewayCloseCode::is_fatal)
            }
            _ => false,
        }
    }

    /// Returns whether the stored session is still worth resuming after this error.
    #[must_use]
    pub fn can_resume(&self) -> bool {
        match self {
            Self::SessionInvalidated { resumable } => *resumable,
            Self::ConnectionClosed { code, .. } => GatewayCloseCode::from_u16(*code)
                .is_none_or(GatewayCloseCode::is_resumable),
            Self::ConnectionFailed { .. }
            | Self::Transport { .. }
            | Self::HeartbeatTimeout
            | Self::ReconnectRequested
            | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    #[must_use]
    pub const fn close_code(&self) -> Option<u16> {
        if let Self::ConnectionClosed { code, .. } = self {
            Some(*code)
        } else {
            None
        }
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AuthenticationFailed { message } => Self::authentication(message),
            GatewayError::ConnectionClosed { code: 4004, reason } => Self::authentication(reason),
            GatewayError::InvalidationLimit { attempts } => Self::SessionInvalidated { attempts },
            GatewayError::NotConnected | GatewayError::ShuttingDown => Self::NotConnected,
            other => Self::transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl GatewayCloseCode {
    #[must_use]
    pub const fn from_u16(code: u16) -> Option<Self> {
        match code {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// Codes after which the old session id and sequence are useless.
    #[must_use]
    pub const fn is_resumable(self) -> bool {
        !matches!(self, Self::InvalidSequence | Self::SessionTimedOut) && !self.is_fatal()
    }

    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }
}
