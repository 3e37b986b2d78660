//! Bearer token acquisition for Key Vault requests.
//!
//! [`TokenProvider`] is the only thing the Key Vault client knows about
//! authentication. The production implementation runs the OAuth2
//! client-credentials flow with a certificate-signed client assertion.

use crate::config::VaultConfig;
use crate::credentials::CredentialMaterial;
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::secrets::TokenResponse;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use rsa::pkcs1::EncodeRsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Source of bearer tokens for Key Vault requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A currently valid bearer token.
    async fn bearer_token(&self) -> KeyVaultResult<SecretString>;
}

/// A fixed, externally obtained bearer token.
pub struct StaticToken(SecretString);

impl StaticToken {
    /// Wrap a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> KeyVaultResult<SecretString> {
        Ok(SecretString::from(self.0.expose_secret().to_owned()))
    }
}

/// Claims of the client assertion JWT.
#[derive(Debug, Serialize)]
struct ClientAssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: i64,
    iat: i64,
    exp: i64,
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Service principal token obtained with a certificate credential.
///
/// Tokens are cached and re-acquired once less than the configured refresh
/// window of their lifetime remains.
pub struct ServicePrincipalCertificateToken {
    application_id: String,
    resource: String,
    token_endpoint: String,
    encoding_key: EncodingKey,
    x5t: String,
    x5t_s256: String,
    assertion_lifetime: Duration,
    refresh_window: Duration,
    http: Client,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServicePrincipalCertificateToken {
    /// Create a provider for `application_id` in `tenant_id`, scoped to
    /// `config.resource`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Auth`] if the private key cannot be turned
    /// into a signing key.
    pub fn new(
        application_id: impl Into<String>,
        credentials: &CredentialMaterial,
        tenant_id: &str,
        config: &VaultConfig,
        http: Client,
    ) -> KeyVaultResult<Self> {
        let der = credentials
            .private_key
            .to_pkcs1_der()
            .map_err(|e| KeyVaultError::auth(format!("cannot encode signing key: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        Ok(Self {
            application_id: application_id.into(),
            resource: config.resource.clone(),
            token_endpoint: config.token_endpoint(tenant_id),
            encoding_key,
            x5t: URL_SAFE_NO_PAD.encode(credentials.certificate.sha1_thumbprint()),
            x5t_s256: URL_SAFE_NO_PAD.encode(credentials.certificate.sha256_thumbprint()),
            assertion_lifetime: config.assertion_lifetime,
            refresh_window: config.refresh_window,
            http,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Sign a fresh client assertion.
    fn client_assertion(&self) -> KeyVaultResult<String> {
        let now = chrono::Utc::now().timestamp();
        let lifetime = i64::try_from(self.assertion_lifetime.as_secs()).unwrap_or(600);

        let mut header = Header::new(Algorithm::RS256);
        header.x5t = Some(self.x5t.clone());
        header.x5t_s256 = Some(self.x5t_s256.clone());

        let claims = ClientAssertionClaims {
            aud: &self.token_endpoint,
            iss: &self.application_id,
            sub: &self.application_id,
            jti: uuid::Uuid::new_v4().to_string(),
            nbf: now,
            iat: now,
            exp: now + lifetime,
        };

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| KeyVaultError::auth(format!("cannot sign client assertion: {e}")))
    }

    /// Exchange a new client assertion for a bearer token and cache it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Http`] if the token endpoint cannot be
    /// reached, and [`KeyVaultError::Auth`] if signing fails or the endpoint
    /// rejects the assertion or answers with garbage.
    #[instrument(skip(self), fields(application_id = %self.application_id, resource = %self.resource))]
    pub async fn authenticate(&self) -> KeyVaultResult<()> {
        let assertion = self.client_assertion()?;
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.application_id.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
            ("resource", self.resource.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KeyVaultError::auth(format!("Status {status}: {text}")));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| KeyVaultError::auth(format!("unexpected token response: {e}")))?;

        let ttl = payload
            .expires_in
            .as_ref()
            .and_then(crate::secrets::Seconds::as_secs)
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

        *self.token.write().await = Some(CachedToken {
            token: SecretString::from(payload.access_token),
            expires_at: Instant::now() + ttl,
        });

        info!(ttl_secs = ttl.as_secs(), "Obtained OAuth token");
        Ok(())
    }

    async fn cached_token(&self) -> Option<SecretString> {
        let guard = self.token.read().await;
        let cached = guard.as_ref()?;
        let remaining = cached.expires_at.saturating_duration_since(Instant::now());
        if remaining <= self.refresh_window {
            debug!(remaining_secs = remaining.as_secs(), "Cached token due for refresh");
            return None;
        }
        Some(SecretString::from(cached.token.expose_secret().to_owned()))
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipalCertificateToken {
    async fn bearer_token(&self) -> KeyVaultResult<SecretString> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        self.authenticate().await?;

        self.token
            .read()
            .await
            .as_ref()
            .map(|cached| SecretString::from(cached.token.expose_secret().to_owned()))
            .ok_or_else(|| KeyVaultError::auth("No token available"))
    }
}
