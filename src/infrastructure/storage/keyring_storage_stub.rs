//! Token storage for builds without keyring support.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;
use crate::domain::ports::TokenStoragePort;

/// Stand-in used when the `keyring` feature is off. Nothing is ever stored.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn with_names(_service: impl Into<String>, _user: impl Into<String>) -> Self {
        Self
    }
}

impl Default for KeyringTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStoragePort for KeyringTokenStorage {
    async fn get_token(&self) -> Result<Option<AuthToken>, SecretError> {
        debug!("Built without keyring support, no stored token");
        Ok(None)
    }

    async fn store_token(&self, _token: &AuthToken) -> Result<(), SecretError> {
        Err(SecretError::NotAvailable(
            "built without keyring support".to_string(),
        ))
    }

    async fn delete_token(&self) -> Result<(), SecretError> {
        Ok(())
    }
}
