//! Generic secret source trait.

use crate::error::KeyVaultError;
use crate::secrets::SecretValue;
use async_trait::async_trait;

/// Anything that can resolve a secret name to its decoded value.
///
/// The writer only depends on this trait, so the role table and file output
/// can be exercised without a vault.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the latest version of `secret_name`.
    async fn fetch(&self, secret_name: &str) -> Result<SecretValue, KeyVaultError>;
}
