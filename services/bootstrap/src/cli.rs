//! Command-line interface.

use azkvbs_keyvault::config::DEFAULT_CLOUD_CONFIG_PATH;
use azkvbs_keyvault::writer::DEFAULT_DESTINATION_DIR;
use clap::Parser;
use std::path::PathBuf;

/// Fetch a node's TLS material and kubeconfigs from Azure Key Vault.
#[derive(Debug, Clone, Parser)]
#[command(name = "azkvbs", version, about)]
pub struct Args {
    /// Path to the azure cloud config file used by kubernetes and this bootstrap tool
    #[arg(long, alias = "cloudConfigPath", default_value = DEFAULT_CLOUD_CONFIG_PATH)]
    pub cloud_config_path: PathBuf,

    /// The type of the machine (master|minion); determines what secrets to bootstrap
    #[arg(long, alias = "machineType", value_name = "ROLE")]
    pub machine_type: Option<String>,

    /// Machine type given positionally
    #[arg(value_name = "ROLE", conflicts_with = "machine_type")]
    pub role: Option<String>,

    /// The directory to drop secrets in
    #[arg(long, alias = "destinationDir", default_value = DEFAULT_DESTINATION_DIR)]
    pub destination_dir: PathBuf,

    /// Retries for transient Key Vault failures (0 fails on the first error)
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    /// The requested machine type, from the flag or the positional argument.
    /// Empty when neither was given.
    #[must_use]
    pub fn machine_type(&self) -> &str {
        self.machine_type
            .as_deref()
            .or(self.role.as_deref())
            .unwrap_or_default()
    }
}
