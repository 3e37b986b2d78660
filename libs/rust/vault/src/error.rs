//! Key Vault bootstrap error types using thiserror 2.0.
//!
//! Every variant is fatal to a bootstrap run. The retryability
//! classification only matters when the caller opted in to bounded retries.

use azkvbs_common::Retryable;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading credentials, talking to Key Vault or writing
/// secrets to disk.
#[derive(Error, Debug)]
pub enum KeyVaultError {
    /// Bad or missing config file, bad PEM/DER, unknown machine role
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential construction or token exchange failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Key Vault answered with something other than 200 OK
    #[error("Key Vault returned {status}: {body}")]
    Remote {
        /// Response status
        status: StatusCode,
        /// Response body, as text
        body: String,
    },

    /// Malformed JSON envelope or base64 payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local file write failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for Key Vault operations.
pub type KeyVaultResult<T> = Result<T, KeyVaultError>;

impl KeyVaultError {
    /// Check if error is retryable.
    ///
    /// Transport failures, throttling and server errors are transient;
    /// everything else (including 404) is permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Remote { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an I/O error bound to the path that failed.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl Retryable for KeyVaultError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}
