//! Discord authentication token value object.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Kind of account a token authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bot token, sent with the `Bot ` prefix.
    Bot,
    /// User account token, sent as-is.
    User,
}

/// Discord authentication token with validation and masking.
///
/// The stored value is exactly what goes into the `Authorization` header and
/// the gateway identify payload. The buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AuthToken {
    value: String,
}

impl AuthToken {
    const MIN_TOKEN_LENGTH: usize = 50;
    const BOT_PREFIX: &'static str = "Bot ";

    /// Creates new token with format validation. A leading `Bot ` prefix is kept.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        let raw = value.strip_prefix(Self::BOT_PREFIX).unwrap_or(&value);

        if raw.len() < Self::MIN_TOKEN_LENGTH || raw.split('.').count() != 3 {
            return None;
        }

        Some(Self { value })
    }

    /// Creates a bot token, adding the `Bot ` prefix when missing.
    #[must_use]
    pub fn bot(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.starts_with(Self::BOT_PREFIX) {
            Self::new(trimmed)
        } else {
            Self::new(format!("{}{trimmed}", Self::BOT_PREFIX))
        }
    }

    /// Creates token without validation.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TokenKind {
        if self.value.starts_with(Self::BOT_PREFIX) {
            TokenKind::Bot
        } else {
            TokenKind::User
        }
    }

    /// Returns the header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.value)
    }

    /// Returns masked token for display.
    #[must_use]
    pub fn masked(&self) -> String {
        let raw = self
            .value
            .strip_prefix(Self::BOT_PREFIX)
            .unwrap_or(&self.value);
        if raw.len() <= 10 {
            return "*".repeat(raw.len());
        }

        format!("{}...{}", &raw[..4], &raw[raw.len() - 4..])
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("kind", &self.kind())
            .field("value", &self.masked())
            .finish()
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "MTIzNDU2Nzg5MDEyMzQ1Njc4OQ.XXXXXX.YYYYYYYYYYYYYYYYYYYYYYYYYYYY";

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(AuthToken::new("short").is_none());
        assert!(AuthToken::new("a".repeat(60)).is_none());
    }

    #[test]
    fn test_bot_prefix_is_added_once() {
        let token = AuthToken::bot(RAW).map(|t| t.as_str().to_string());
        assert_eq!(token.as_deref(), Some(format!("Bot {RAW}").as_str()));

        let again = AuthToken::bot(format!("Bot {RAW}")).map(|t| t.into_inner());
        assert_eq!(again, token);
    }

    #[test]
    fn test_kind_detection() {
        let user = AuthToken::new(RAW);
        assert_eq!(user.map(|t| t.kind()), Some(TokenKind::User));

        let bot = AuthToken::new(format!("Bot {RAW}"));
        assert_eq!(bot.map(|t| t.kind()), Some(TokenKind::Bot));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let token = AuthToken::new_unchecked(format!("Bot {RAW}"));
        let debug_output = format!("{token:?}");

        assert!(!debug_output.contains(RAW));
        assert!(debug_output.contains("MTIz..."));
    }
}
