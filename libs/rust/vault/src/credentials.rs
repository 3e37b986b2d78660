//! Service principal certificate and RSA private key loading.

use crate::error::{KeyVaultError, KeyVaultResult};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, PrivateKeyInfo};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, instrument};
use x509_parser::prelude::{FromDer, X509Certificate};

/// `rsaEncryption`, the PKCS#8 algorithm identifier of an RSA key.
const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// A parsed X.509 certificate, reduced to what the client assertion needs.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    sha1_thumbprint: Vec<u8>,
    sha256_thumbprint: Vec<u8>,
}

impl Certificate {
    /// Parse a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Config`] on malformed DER or trailing bytes.
    pub fn from_der(der: &[u8]) -> KeyVaultResult<Self> {
        let (rest, cert) = X509Certificate::from_der(der)
            .map_err(|e| KeyVaultError::config(format!("failed to parse certificate: {e}")))?;
        if !rest.is_empty() {
            return Err(KeyVaultError::config(format!(
                "certificate has {} trailing bytes",
                rest.len()
            )));
        }

        let sha1 = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, der);
        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            sha1_thumbprint: sha1.as_ref().to_vec(),
            sha256_thumbprint: Sha256::digest(der).to_vec(),
        })
    }

    /// DER encoding of the certificate.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name, e.g. `CN=node-bootstrap, O=example`.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// SHA-1 digest of the DER encoding (the JWT `x5t` thumbprint).
    #[must_use]
    pub fn sha1_thumbprint(&self) -> &[u8] {
        &self.sha1_thumbprint
    }

    /// SHA-256 digest of the DER encoding (the JWT `x5t#S256` thumbprint).
    #[must_use]
    pub fn sha256_thumbprint(&self) -> &[u8] {
        &self.sha256_thumbprint
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("der_len", &self.der.len())
            .finish_non_exhaustive()
    }
}

/// Certificate and private key of the service principal.
pub struct CredentialMaterial {
    /// Certificate registered with the application
    pub certificate: Certificate,
    /// Private key matching the certificate
    pub private_key: RsaPrivateKey,
}

impl fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialMaterial")
            .field("certificate", &self.certificate)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Load the service principal certificate and RSA private key.
///
/// # Errors
///
/// Returns [`KeyVaultError::Config`] if either file is unreadable, holds no
/// PEM block, or does not contain a certificate / RSA private key.
#[instrument(skip_all, fields(cert_path = %cert_path.as_ref().display(), key_path = %key_path.as_ref().display()))]
pub async fn load_credentials(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> KeyVaultResult<CredentialMaterial> {
    info!("Loading certificate");
    let cert_pem = read_pem("certificate", cert_path.as_ref()).await?;
    let certificate = Certificate::from_der(cert_pem.contents())?;
    info!(subject = %certificate.subject(), "Parsed certificate");

    info!("Parsing RSA key out of private key file");
    let key_pem = read_pem("private key", key_path.as_ref()).await?;
    let private_key = parse_rsa_private_key(key_pem.contents())?;

    Ok(CredentialMaterial {
        certificate,
        private_key,
    })
}

/// Parse an RSA private key from PKCS#1 DER, falling back to PKCS#8 DER.
///
/// # Errors
///
/// Returns [`KeyVaultError::Config`] if the PKCS#8 container holds a
/// non-RSA key, or if neither encoding parses.
pub fn parse_rsa_private_key(der: &[u8]) -> KeyVaultResult<RsaPrivateKey> {
    let pkcs1_err = match RsaPrivateKey::from_pkcs1_der(der) {
        Ok(key) => {
            debug!("Private key is PKCS#1");
            return Ok(key);
        }
        Err(e) => e,
    };

    let pkcs8_err = match RsaPrivateKey::from_pkcs8_der(der) {
        Ok(key) => {
            debug!("Private key is PKCS#8");
            return Ok(key);
        }
        Err(e) => e,
    };

    if let Ok(info) = PrivateKeyInfo::try_from(der) {
        let oid = info.algorithm.oid.to_string();
        if oid != RSA_ENCRYPTION_OID {
            return Err(KeyVaultError::config(format!(
                "PKCS#8 contained a non-RSA key (algorithm {oid}) where RSA expected"
            )));
        }
    }

    Err(KeyVaultError::config(format!(
        "failed to parse private key as PKCS#1 ({pkcs1_err}) or PKCS#8 ({pkcs8_err})"
    )))
}

async fn read_pem(kind: &str, path: &Path) -> KeyVaultResult<pem::Pem> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        KeyVaultError::config(format!("cannot read {kind} {}: {e}", path.display()))
    })?;
    pem::parse(&data).map_err(|e| {
        KeyVaultError::config(format!(
            "failed to decode a PEM block from {kind} {}: {e}",
            path.display()
        ))
    })
}
