//! Cloud config file and Key Vault endpoint configuration.

use crate::error::{KeyVaultError, KeyVaultResult};
use azkvbs_common::HttpConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default location of the cloud config shared with the Kubernetes Azure
/// cloud provider.
pub const DEFAULT_CLOUD_CONFIG_PATH: &str = "/etc/kubernetes/azure-config.json";

/// Key Vault data-plane API version pinned for secret reads.
pub const VAULT_API_VERSION: &str = "2015-06-01";

/// Secret URL template; `{secret-version}` empty means latest.
pub const SECRET_URL_TEMPLATE: &str =
    "https://{vault-name}.vault.azure.net/secrets/{secret-name}/{secret-version}";

/// Resource the bearer token is scoped to.
pub const VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Azure AD authority for the public cloud.
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Service principal settings read from the JSON cloud config.
///
/// Unknown keys are ignored: the same file carries the Kubernetes cloud
/// provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfig {
    /// PEM file holding the service principal's RSA private key
    pub private_key_path: String,
    /// PEM file holding the service principal's certificate
    pub certificate_path: String,
    /// Application (client) id of the service principal
    pub application_id: String,
    /// Azure AD tenant id
    pub tenant_id: String,
    /// Subscription id; carried for the cloud provider, unused here
    pub subscription_id: String,
    /// Key Vault name (the `{vault-name}` in `{vault-name}.vault.azure.net`)
    pub vault_name: String,
}

impl CloudConfig {
    /// Load and validate the cloud config file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Config`] if the file cannot be read, is not
    /// valid JSON, misses a field, or has an empty field.
    pub fn load_from_file(path: impl AsRef<Path>) -> KeyVaultResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| {
            KeyVaultError::config(format!("cannot read cloud config {}: {e}", path.display()))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            KeyVaultError::Config(msg) => {
                KeyVaultError::config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate a cloud config document.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Config`] on malformed JSON, a missing field,
    /// or an empty field.
    pub fn from_json(raw: &[u8]) -> KeyVaultResult<Self> {
        let config: Self = serde_json::from_slice(raw)
            .map_err(|e| KeyVaultError::config(format!("invalid cloud config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> KeyVaultResult<()> {
        let fields = [
            ("privateKeyPath", &self.private_key_path),
            ("certificatePath", &self.certificate_path),
            ("applicationId", &self.application_id),
            ("tenantId", &self.tenant_id),
            ("subscriptionId", &self.subscription_id),
            ("vaultName", &self.vault_name),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(KeyVaultError::config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Key Vault and Azure AD endpoint configuration.
///
/// Defaults target the public Azure cloud; the overrides exist for sovereign
/// clouds and for pointing at a local mock.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Secret URL template with `{vault-name}`, `{secret-name}` and
    /// `{secret-version}` placeholders
    pub secret_url_template: String,
    /// Value of the `api-version` query parameter
    pub api_version: String,
    /// Resource the bearer token is requested for
    pub resource: String,
    /// Azure AD authority host
    pub authority_host: String,
    /// Refresh the cached token once less than this much lifetime remains
    pub refresh_window: Duration,
    /// Validity of each signed client assertion
    pub assertion_lifetime: Duration,
    /// HTTP client settings
    pub http: HttpConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            secret_url_template: SECRET_URL_TEMPLATE.to_string(),
            api_version: VAULT_API_VERSION.to_string(),
            resource: VAULT_RESOURCE.to_string(),
            authority_host: AUTHORITY_HOST.to_string(),
            refresh_window: Duration::from_secs(300),
            assertion_lifetime: Duration::from_secs(600),
            http: HttpConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Set the secret URL template.
    #[must_use]
    pub fn with_secret_url_template(mut self, template: impl Into<String>) -> Self {
        self.secret_url_template = template.into();
        self
    }

    /// Set the Azure AD authority host.
    #[must_use]
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Set the token resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Set the token refresh window.
    #[must_use]
    pub const fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Set HTTP client settings.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Token endpoint for `tenant_id`.
    #[must_use]
    pub fn token_endpoint(&self, tenant_id: &str) -> String {
        format!(
            "{}/{tenant_id}/oauth2/token",
            self.authority_host.trim_end_matches('/')
        )
    }

    /// Build the URL of the latest version of `secret_name` in `vault_name`.
    ///
    /// The template supplies scheme, host and path; `api-version` is always
    /// added as a query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Config`] if a name contains characters Key
    /// Vault does not allow, or the result is not a valid URL.
    pub fn secret_url(&self, vault_name: &str, secret_name: &str) -> KeyVaultResult<Url> {
        check_name("vault name", vault_name)?;
        check_name("secret name", secret_name)?;

        let raw = self
            .secret_url_template
            .replace("{vault-name}", vault_name)
            .replace("{secret-name}", secret_name)
            .replace("{secret-version}", "");

        let mut url = Url::parse(&raw)
            .map_err(|e| KeyVaultError::config(format!("invalid secret URL {raw}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}

/// Key Vault object and vault names are restricted to ASCII alphanumerics and
/// dashes, so they can be substituted into the URL without escaping.
fn check_name(kind: &str, name: &str) -> KeyVaultResult<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(KeyVaultError::config(format!("invalid {kind}: {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "privateKeyPath": "/etc/kubernetes/sp.key",
        "certificatePath": "/etc/kubernetes/sp.crt",
        "applicationId": "00000000-0000-0000-0000-000000000001",
        "tenantId": "00000000-0000-0000-0000-000000000002",
        "subscriptionId": "00000000-0000-0000-0000-000000000003",
        "vaultName": "cluster-vault",
        "resourceGroup": "ignored-by-bootstrap"
    }"#;

    #[test]
    fn test_parse_cloud_config() {
        let config = CloudConfig::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(config.vault_name, "cluster-vault");
        assert_eq!(config.private_key_path, "/etc/kubernetes/sp.key");
        assert_eq!(config.application_id, "00000000-0000-0000-0000-000000000001");
    }

    #[test]
    fn test_missing_field_rejected() {
        let raw = r#"{"privateKeyPath": "a", "certificatePath": "b"}"#;
        let err = CloudConfig::from_json(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, KeyVaultError::Config(_)));
    }

    #[test]
    fn test_empty_field_rejected() {
        let raw = SAMPLE.replace("cluster-vault", " ");
        let err = CloudConfig::from_json(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("vaultName"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CloudConfig::load_from_file("/nonexistent/azure-config.json").unwrap_err();
        assert!(matches!(err, KeyVaultError::Config(_)));
        assert!(err.to_string().contains("/nonexistent/azure-config.json"));
    }

    #[test]
    fn test_secret_url_latest_version() {
        let url = VaultConfig::default()
            .secret_url("cluster-vault", "ca-crt")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cluster-vault.vault.azure.net/secrets/ca-crt/?api-version=2015-06-01"
        );
    }

    #[test]
    fn test_secret_url_rejects_unsafe_names() {
        let config = VaultConfig::default();
        assert!(config.secret_url("cluster-vault", "../keys").is_err());
        assert!(config.secret_url("evil.example.com/x", "ca-crt").is_err());
        assert!(config.secret_url("cluster-vault", "").is_err());
    }

    #[test]
    fn test_token_endpoint() {
        let config = VaultConfig::default().with_authority_host("http://127.0.0.1:8080/");
        assert_eq!(
            config.token_endpoint("tenant"),
            "http://127.0.0.1:8080/tenant/oauth2/token"
        );
    }
}
