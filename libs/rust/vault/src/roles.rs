//! Machine roles and the secrets each one needs at first boot.

use crate::error::KeyVaultError;
use std::fmt;
use std::str::FromStr;

/// A secret to fetch and the file it is written to, relative to the
/// destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretTarget {
    /// Key Vault secret name
    pub secret_name: &'static str,
    /// Output file name
    pub file_name: &'static str,
}

const fn target(secret_name: &'static str, file_name: &'static str) -> SecretTarget {
    SecretTarget {
        secret_name,
        file_name,
    }
}

const MASTER_SECRETS: &[SecretTarget] = &[
    target("ca-crt", "ca.crt"),
    target("apiserver-crt", "apiserver.crt"),
    target("apiserver-key", "apiserver.key"),
    target("master-proxy-kubeconfig", "master-proxy-kubeconfig"),
    target("master-kubelet-kubeconfig", "master-kubelet-kubeconfig"),
    target("master-scheduler-kubeconfig", "master-scheduler-kubeconfig"),
    target(
        "master-controller-manager-kubeconfig",
        "master-controller-manager-kubeconfig",
    ),
];

const MINION_SECRETS: &[SecretTarget] = &[
    target("minion-proxy-kubeconfig", "minion-proxy-kubeconfig"),
    target("minion-kubelet-kubeconfig", "minion-kubelet-kubeconfig"),
];

/// Role of the node being bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineRole {
    /// Control-plane node
    Master,
    /// Worker node
    Minion,
}

impl MachineRole {
    /// All roles.
    pub const ALL: [Self; 2] = [Self::Master, Self::Minion];

    /// Secrets this role needs. Entries are independent of each other.
    #[must_use]
    pub const fn secrets(self) -> &'static [SecretTarget] {
        match self {
            Self::Master => MASTER_SECRETS,
            Self::Minion => MINION_SECRETS,
        }
    }

    /// Name as accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Minion => "minion",
        }
    }
}

impl FromStr for MachineRole {
    type Err = KeyVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Self::Master),
            "minion" => Ok(Self::Minion),
            other => Err(KeyVaultError::config(format!(
                "unknown machine type {other:?} (expected master|minion)"
            ))),
        }
    }
}

impl fmt::Display for MachineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
