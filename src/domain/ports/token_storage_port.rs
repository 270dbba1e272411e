//! Token storage port definition.

use async_trait::async_trait;

use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;

/// Port for persisting the account token between runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStoragePort: Send + Sync {
    /// Retrieves stored token.
    async fn get_token(&self) -> Result<Option<AuthToken>, SecretError>;

    /// Stores token securely.
    async fn store_token(&self, token: &AuthToken) -> Result<(), SecretError>;

    /// Deletes stored token.
    async fn delete_token(&self) -> Result<(), SecretError>;
}
