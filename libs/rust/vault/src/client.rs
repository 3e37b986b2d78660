//! Key Vault HTTP client.

use crate::{
    config::VaultConfig,
    error::{KeyVaultError, KeyVaultResult},
    provider::SecretSource,
    secrets::{SecretBundle, SecretValue},
    token::TokenProvider,
};
use async_trait::async_trait;
use azkvbs_common::build_http_client;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

/// Key Vault client authorised by a [`TokenProvider`].
pub struct KeyVaultClient<P> {
    vault_name: String,
    config: VaultConfig,
    http: Client,
    authorizer: P,
}

impl<P: TokenProvider> KeyVaultClient<P> {
    /// Create a client for `vault_name`, building its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Http`] if the HTTP client cannot be built.
    pub fn new(
        vault_name: impl Into<String>,
        config: VaultConfig,
        authorizer: P,
    ) -> KeyVaultResult<Self> {
        let http = build_http_client(&config.http)?;
        Ok(Self::with_http_client(vault_name, config, authorizer, http))
    }

    /// Create a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_http_client(
        vault_name: impl Into<String>,
        config: VaultConfig,
        authorizer: P,
        http: Client,
    ) -> Self {
        Self {
            vault_name: vault_name.into(),
            config,
            http,
            authorizer,
        }
    }

    /// Name of the vault this client reads from.
    #[must_use]
    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    /// The request authorizer.
    pub const fn authorizer(&self) -> &P {
        &self.authorizer
    }

    /// Fetch and decode the latest version of `secret_name`.
    ///
    /// # Errors
    ///
    /// - [`KeyVaultError::Config`] for a name Key Vault cannot hold
    /// - [`KeyVaultError::Auth`] if no bearer token can be obtained
    /// - [`KeyVaultError::Http`] on transport failure
    /// - [`KeyVaultError::Remote`] for any status other than 200
    /// - [`KeyVaultError::Decode`] for a malformed body or payload
    #[instrument(skip(self), fields(vault = %self.vault_name))]
    pub async fn get_secret(&self, secret_name: &str) -> KeyVaultResult<SecretValue> {
        let url = self.config.secret_url(&self.vault_name, secret_name)?;
        let token = self.authorizer.bearer_token().await?;

        debug!(%url, "Requesting secret");
        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(KeyVaultError::Remote { status, body });
        }

        let body = response.bytes().await?;
        let value = SecretBundle::from_json(&body)?.decode()?;
        debug!(bytes = value.len(), "Secret decoded");
        Ok(value)
    }
}

#[async_trait]
impl<P: TokenProvider> SecretSource for KeyVaultClient<P> {
    async fn fetch(&self, secret_name: &str) -> KeyVaultResult<SecretValue> {
        self.get_secret(secret_name).await
    }
}
