//! Writes a role's secrets to the destination directory.

use crate::error::{KeyVaultError, KeyVaultResult};
use crate::provider::SecretSource;
use crate::roles::MachineRole;
use crate::secrets::SecretValue;
use azkvbs_common::RetryPolicy;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Permission bits of every written secret file.
pub const SECRET_FILE_MODE: u32 = 0o644;

/// Default destination directory.
pub const DEFAULT_DESTINATION_DIR: &str = "/etc/kubernetes";

/// One written secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenSecret {
    /// Key Vault secret name
    pub secret_name: &'static str,
    /// File the decoded value was written to
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes: usize,
}

/// Outcome of a complete bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Role that was bootstrapped
    pub role: MachineRole,
    /// Files written, in write order
    pub written: Vec<WrittenSecret>,
}

/// Fetches each secret of a role and writes it to disk.
///
/// The first failure aborts the run: nothing is written for the failing
/// secret and later secrets are not requested.
pub struct SecretWriter<'a, S> {
    source: &'a S,
    destination_dir: PathBuf,
    retry: RetryPolicy,
}

impl<'a, S: SecretSource> SecretWriter<'a, S> {
    /// Create a writer that never retries.
    pub fn new(source: &'a S, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            destination_dir: destination_dir.into(),
            retry: RetryPolicy::none(),
        }
    }

    /// Retry transient fetch failures according to `retry`.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Directory the secrets are written to.
    #[must_use]
    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    /// Fetch and write every secret of `role`.
    ///
    /// # Errors
    ///
    /// Returns the first fetch or write error.
    #[instrument(skip(self), fields(destination_dir = %self.destination_dir.display()))]
    pub async fn run(&self, role: MachineRole) -> KeyVaultResult<BootstrapReport> {
        let targets = role.secrets();
        let mut written = Vec::with_capacity(targets.len());

        for target in targets {
            let source = self.source;
            let secret_name = target.secret_name;
            let value = self.retry.execute(move || source.fetch(secret_name)).await?;

            let path = self.destination_dir.join(target.file_name);
            write_secret(&path, &value).await?;
            info!(secret = secret_name, path = %path.display(), bytes = value.len(), "Wrote secret");

            written.push(WrittenSecret {
                secret_name,
                path,
                bytes: value.len(),
            });
        }

        Ok(BootstrapReport { role, written })
    }
}

/// Create or truncate `path`, write `value`, and force [`SECRET_FILE_MODE`].
async fn write_secret(path: &Path, value: &SecretValue) -> KeyVaultResult<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(SECRET_FILE_MODE);

    let mut file = options
        .open(path)
        .await
        .map_err(|e| KeyVaultError::io(path, e))?;
    file.write_all(value.expose())
        .await
        .map_err(|e| KeyVaultError::io(path, e))?;
    file.flush().await.map_err(|e| KeyVaultError::io(path, e))?;

    // mode() only applies on creation and is subject to the umask
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(SECRET_FILE_MODE))
            .await
            .map_err(|e| KeyVaultError::io(path, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves every secret as its own name and records requests.
    #[derive(Default)]
    struct EchoSource {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SecretSource for EchoSource {
        async fn fetch(&self, secret_name: &str) -> KeyVaultResult<SecretValue> {
            self.requested.lock().unwrap().push(secret_name.to_string());
            Ok(SecretValue::new(secret_name.as_bytes().to_vec()))
        }
    }

    #[tokio::test]
    async fn test_writes_every_minion_secret() {
        let dir = tempfile::tempdir().unwrap();
        let source = EchoSource::default();

        let report = SecretWriter::new(&source, dir.path())
            .run(MachineRole::Minion)
            .await
            .unwrap();

        assert_eq!(report.role, MachineRole::Minion);
        assert_eq!(report.written.len(), 2);
        let kubelet = std::fs::read(dir.path().join("minion-kubelet-kubeconfig")).unwrap();
        assert_eq!(kubelet, b"minion-kubelet-kubeconfig");
        assert_eq!(
            *source.requested.lock().unwrap(),
            ["minion-proxy-kubeconfig", "minion-kubelet-kubeconfig"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_file_truncated_and_mode_forced() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.crt");
        std::fs::write(&path, b"a much longer previous certificate body").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        write_secret(&path, &SecretValue::new(b"new".to_vec()))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SECRET_FILE_MODE);
    }

    #[tokio::test]
    async fn test_missing_destination_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = EchoSource::default();

        let err = SecretWriter::new(&source, dir.path().join("missing"))
            .run(MachineRole::Master)
            .await
            .unwrap_err();

        assert!(matches!(err, KeyVaultError::Io { .. }));
        // aborted after the first write failure
        assert_eq!(*source.requested.lock().unwrap(), ["ca-crt"]);
    }
}
