//! Wire types for Key Vault and Azure AD responses.

use crate::error::{KeyVaultError, KeyVaultResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretSlice};
use serde::Deserialize;
use std::fmt;

/// Key Vault secret bundle. Only `value` matters to the bootstrap; it holds
/// the base64 encoding of the file contents.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBundle {
    /// Base64-encoded secret content
    pub value: String,
    /// Secret identifier URL
    #[serde(default)]
    pub id: Option<String>,
    /// Content type set at upload time
    #[serde(default)]
    pub content_type: Option<String>,
}

impl SecretBundle {
    /// Parse a bundle from a response body.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Decode`] if the body is not a JSON object
    /// with a string `value`.
    pub fn from_json(body: &[u8]) -> KeyVaultResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| KeyVaultError::decode(format!("unexpected secret bundle: {e}")))
    }

    /// Base64-decode `value`. Line breaks are skipped so values uploaded
    /// from wrapped `base64` output decode as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Decode`] on invalid base64.
    pub fn decode(self) -> KeyVaultResult<SecretValue> {
        let unwrapped: Vec<u8> = self
            .value
            .bytes()
            .filter(|&b| !matches!(b, b'\r' | b'\n'))
            .collect();
        let bytes = STANDARD
            .decode(unwrapped)
            .map_err(|e| KeyVaultError::decode(format!("secret value is not base64: {e}")))?;
        Ok(SecretValue::new(bytes))
    }
}

impl fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBundle")
            .field("value", &"[REDACTED]")
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Decoded secret bytes.
pub struct SecretValue(SecretSlice<u8>);

impl SecretValue {
    /// Wrap decoded bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(SecretSlice::from(bytes))
    }

    /// Access the plaintext.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &"[REDACTED]")
            .field("len", &self.len())
            .finish()
    }
}

/// Azure AD token endpoint response.
#[derive(Deserialize)]
pub struct TokenResponse {
    /// Bearer token
    pub access_token: String,
    /// Lifetime in seconds; the v1 endpoint sends it as a string
    #[serde(default)]
    pub expires_in: Option<Seconds>,
    /// Token type, normally `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// A number of seconds encoded either as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Seconds {
    /// `3599`
    Number(u64),
    /// `"3599"`
    Text(String),
}

impl Seconds {
    /// Numeric value, if the text form parses.
    #[must_use]
    pub fn as_secs(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}
