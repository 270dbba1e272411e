//! Token resolution use case.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;
use crate::domain::ports::TokenStoragePort;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Keyring,
    /// `--token` or `DISCORD_TOKEN`.
    CommandLine,
}

impl TokenSource {
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Keyring => "system keyring",
            Self::CommandLine => "command line / environment",
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Resolved token with its source.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub token: AuthToken,
    pub source: TokenSource,
}

impl ResolvedToken {
    #[must_use]
    pub const fn new(token: AuthToken, source: TokenSource) -> Self {
        Self { token, source }
    }
}

/// Resolves the account token from the keyring, then the command line.
pub struct ResolveTokenUseCase {
    storage_port: Arc<dyn TokenStoragePort>,
    bot: bool,
}

impl ResolveTokenUseCase {
    #[must_use]
    pub fn new(storage_port: Arc<dyn TokenStoragePort>) -> Self {
        Self {
            storage_port,
            bot: false,
        }
    }

    /// Treat command-line tokens as bot tokens, adding the `Bot ` prefix.
    #[must_use]
    pub const fn with_bot_prefix(mut self, bot: bool) -> Self {
        self.bot = bot;
        self
    }

    /// Resolves the token.
    ///
    /// Priority:
    /// 1. Keyring
    /// 2. CLI/Env (passed as argument)
    ///
    /// # Errors
    ///
    /// Returns the keyring error when the keyring fails and no usable
    /// command-line token was given.
    pub async fn execute(
        &self,
        cli_token: Option<String>,
    ) -> Result<Option<ResolvedToken>, SecretError> {
        debug!("Checking keyring for stored token");
        let keyring_error = match self.storage_port.get_token().await {
            Ok(Some(token)) => {
                info!("Using token from system keyring");
                return Ok(Some(ResolvedToken::new(token, TokenSource::Keyring)));
            }
            Ok(None) => {
                debug!("No token found in keyring");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to check keyring");
                Some(e)
            }
        };

        if let Some(token_str) = cli_token.filter(|s| !s.trim().is_empty()) {
            let token = if self.bot {
                AuthToken::bot(token_str)
            } else {
                AuthToken::new(token_str)
            };
            match token {
                Some(token) => {
                    info!(token = %token.masked(), "Using token from command line / environment");
                    return Ok(Some(ResolvedToken::new(token, TokenSource::CommandLine)));
                }
                None => warn!("Command-line token has invalid format"),
            }
        }

        match keyring_error {
            Some(e) => Err(e),
            None => {
                debug!("No token found in any source");
                Ok(None)
            }
        }
    }

    /// Saves a command-line token to the keyring for later runs. Keyring
    /// tokens are already stored.
    ///
    /// # Errors
    ///
    /// Returns the keyring error.
    pub async fn persist(&self, resolved: &ResolvedToken) -> Result<bool, SecretError> {
        if resolved.source == TokenSource::Keyring {
            return Ok(false);
        }
        self.storage_port.store_token(&resolved.token).await?;
        info!("Token saved to system keyring");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::always;

    use super::*;
    use crate::domain::ports::MockTokenStoragePort;

    fn make_valid_token() -> String {
        "MTIzNDU2Nzg5MDEyMzQ1Njc4OQ.XXXXXX.YYYYYYYYYYYYYYYYYYYYYYYYYYYY".to_string()
    }

    fn storage_with(token: Option<AuthToken>) -> MockTokenStoragePort {
        let mut storage = MockTokenStoragePort::new();
        storage
            .expect_get_token()
            .returning(move || Ok(token.clone()));
        storage
    }

    #[tokio::test]
    async fn test_keyring_priority() {
        let storage = storage_with(Some(AuthToken::new_unchecked(make_valid_token())));
        let use_case = ResolveTokenUseCase::new(Arc::new(storage));

        let result = use_case
            .execute(Some("cli.token.here".to_string()))
            .await
            .unwrap();

        assert_eq!(result.unwrap().source, TokenSource::Keyring);
    }

    #[tokio::test]
    async fn test_cli_fallback() {
        let use_case = ResolveTokenUseCase::new(Arc::new(storage_with(None)));

        let result = use_case.execute(Some(make_valid_token())).await.unwrap();

        assert_eq!(result.unwrap().source, TokenSource::CommandLine);
    }

    #[tokio::test]
    async fn test_bot_prefix_added() {
        let use_case =
            ResolveTokenUseCase::new(Arc::new(storage_with(None))).with_bot_prefix(true);

        let result = use_case.execute(Some(make_valid_token())).await.unwrap();

        assert!(result.unwrap().token.as_str().starts_with("Bot "));
    }

    #[tokio::test]
    async fn test_no_token_found() {
        let use_case = ResolveTokenUseCase::new(Arc::new(storage_with(None)));

        assert!(use_case.execute(None).await.unwrap().is_none());
        assert!(use_case.execute(Some("  ".into())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keyring_error_surfaces_without_fallback() {
        let mut storage = MockTokenStoragePort::new();
        storage
            .expect_get_token()
            .returning(|| Err(SecretError::NotAvailable("no backend".into())));
        let use_case = ResolveTokenUseCase::new(Arc::new(storage));

        assert_eq!(
            use_case.execute(None).await.unwrap_err(),
            SecretError::NotAvailable("no backend".into())
        );
        assert_eq!(
            use_case
                .execute(Some(make_valid_token()))
                .await
                .unwrap()
                .map(|r| r.source),
            Some(TokenSource::CommandLine)
        );
    }

    #[tokio::test]
    async fn test_persist_only_stores_new_tokens() {
        let mut storage = MockTokenStoragePort::new();
        storage
            .expect_store_token()
            .with(always())
            .times(1)
            .returning(|_| Ok(()));
        let use_case = ResolveTokenUseCase::new(Arc::new(storage));
        let token = AuthToken::new_unchecked(make_valid_token());

        let stored = use_case
            .persist(&ResolvedToken::new(token.clone(), TokenSource::CommandLine))
            .await
            .unwrap();
        let skipped = use_case
            .persist(&ResolvedToken::new(token, TokenSource::Keyring))
            .await
            .unwrap();

        assert!(stored);
        assert!(!skipped);
    }
}
