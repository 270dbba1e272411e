//! Token storage in the platform keyring.

use async_trait::async_trait;
use keyring::Entry;
use tokio::task;
use tracing::{debug, warn};

use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;
use crate::domain::ports::TokenStoragePort;

const KEYRING_SERVICE: &str = "discord-session";
const KEYRING_USER: &str = "token";

/// Keeps the account token in the OS credential store.
///
/// Keyring calls block (D-Bus, Keychain), so each runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    service: String,
    user: String,
}

impl KeyringTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    /// Storage under a custom service and account name.
    #[must_use]
    pub fn with_names(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    async fn with_entry<T, F>(&self, op: F) -> Result<T, SecretError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, SecretError> + Send + 'static,
    {
        let service = self.service.clone();
        let user = self.user.clone();
        task::spawn_blocking(move || {
            let entry =
                Entry::new(&service, &user).map_err(|e| SecretError::NotAvailable(e.to_string()))?;
            op(entry)
        })
        .await
        .map_err(|e| SecretError::NotAvailable(format!("keyring task failed: {e}")))?
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
        debug!(service = %self.service, "Reading token from keyring");
        self.with_entry(|entry| match entry.get_password() {
            Ok(value) => AuthToken::new(value)
                .map(Some)
                .ok_or(SecretError::Malformed),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Failed to read token from keyring");
                Err(SecretError::ReadFailed(e.to_string()))
            }
        })
        .await
    }

    async fn store_token(&self, token: &AuthToken) -> Result<(), SecretError> {
        debug!(service = %self.service, token = %token.masked(), "Storing token in keyring");
        let value = token.as_str().to_string();
        self.with_entry(move |entry| {
            entry.set_password(&value).map_err(|e| {
                warn!(error = %e, "Failed to store token in keyring");
                SecretError::WriteFailed(e.to_string())
            })
        })
        .await
    }

    async fn delete_token(&self) -> Result<(), SecretError> {
        debug!(service = %self.service, "Deleting token from keyring");
        self.with_entry(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Failed to delete token from keyring");
                Err(SecretError::DeleteFailed(e.to_string()))
            }
        })
        .await
    }
}
