//! Node secret bootstrap.
//!
//! Loads the cloud config and service principal credentials once, then
//! writes every secret the node's role needs. Any failure ends the run.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;

pub use cli::Args;

use anyhow::Context;
use azkvbs_common::{RetryConfig, RetryPolicy, build_http_client};
use azkvbs_keyvault::{
    BootstrapReport, CloudConfig, KeyVaultClient, MachineRole, SecretWriter,
    ServicePrincipalCertificateToken, VaultConfig, load_credentials,
};
use tracing::info;

/// Run the bootstrap against the public Azure cloud.
///
/// # Errors
///
/// Returns the first error of any phase.
pub async fn run(args: &Args) -> anyhow::Result<BootstrapReport> {
    run_with_config(args, VaultConfig::default()).await
}

/// Run the bootstrap with explicit endpoint settings.
///
/// # Errors
///
/// Returns the first error of any phase. An unknown machine type fails
/// before any file is read or request is sent.
pub async fn run_with_config(
    args: &Args,
    vault_config: VaultConfig,
) -> anyhow::Result<BootstrapReport> {
    let role: MachineRole = args.machine_type().parse()?;
    info!(%role, "Bootstrapping node secrets");

    info!(path = %args.cloud_config_path.display(), "Loading cloud config");
    let config = CloudConfig::load_from_file(&args.cloud_config_path)?;

    let credentials = load_credentials(&config.certificate_path, &config.private_key_path)
        .await
        .context("failed to load service principal credentials")?;

    let http = build_http_client(&vault_config.http).context("failed to build HTTP client")?;

    info!(application_id = %config.application_id, "Retrieving OAuth token");
    let provider = ServicePrincipalCertificateToken::new(
        config.application_id.as_str(),
        &credentials,
        &config.tenant_id,
        &vault_config,
        http.clone(),
    )?;
    drop(credentials);
    provider
        .authenticate()
        .await
        .context("failed to retrieve OAuth token")?;

    let client =
        KeyVaultClient::with_http_client(config.vault_name.as_str(), vault_config, provider, http);
    let retry = RetryPolicy::new(RetryConfig::default().with_max_retries(args.retries));

    info!(vault = %client.vault_name(), destination_dir = %args.destination_dir.display(), "Writing secrets");
    let report = SecretWriter::new(&client, &args.destination_dir)
        .with_retry_policy(retry)
        .run(role)
        .await
        .with_context(|| format!("failed to bootstrap {role} secrets"))?;

    info!(written = report.written.len(), "done");
    Ok(report)
}
