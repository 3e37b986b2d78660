//! Azure Key Vault client for node bootstrap.
//!
//! Authenticates as a service principal with a certificate credential,
//! fetches the fixed set of secrets a machine role needs and writes their
//! decoded contents to disk.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod provider;
pub mod roles;
pub mod secrets;
pub mod token;
pub mod writer;

pub use client::KeyVaultClient;
pub use config::{CloudConfig, VaultConfig};
pub use credentials::{Certificate, CredentialMaterial, load_credentials};
pub use error::{KeyVaultError, KeyVaultResult};
pub use provider::SecretSource;
pub use roles::{MachineRole, SecretTarget};
pub use secrets::SecretValue;
pub use token::{ServicePrincipalCertificateToken, StaticToken, TokenProvider};
pub use writer::{BootstrapReport, SecretWriter, WrittenSecret};
