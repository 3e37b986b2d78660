//! Centralized HTTP client configuration and building.
//!
//! Every outbound request (token exchange and Key Vault reads) goes through a
//! client built here, so TLS backend and user agent stay consistent.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration.
///
/// Timeouts are unset by default, which leaves the transport defaults in
/// place.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout (default: transport default)
    pub timeout: Option<Duration>,
    /// Connection timeout (default: transport default)
    pub connect_timeout: Option<Duration>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            user_agent: concat!("azkvbs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Set a whole-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set a custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Build a configured HTTP client.
///
/// Creates a reqwest client with rustls TLS and the system trust store.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
///
/// # Examples
///
/// ```
/// use azkvbs_common::{HttpConfig, build_http_client};
///
/// let client = build_http_client(&HttpConfig::default());
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut builder = ClientBuilder::new()
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder.build()
}
