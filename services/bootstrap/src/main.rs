//! `azkvbs` binary: writes a node's Kubernetes secrets from Azure Key Vault.

use azkvbs::Args;
use azkvbs_common::{TracingConfig, init_tracing};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut tracing_config = TracingConfig::default()
        .with_service_name("azkvbs")
        .with_log_level(args.log_level.as_str());
    if args.json_logs {
        tracing_config = tracing_config.with_json_output();
    }
    init_tracing(&tracing_config);

    match azkvbs::run(&args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "Bootstrap failed");
            eprintln!("azkvbs: {err:#}");
            ExitCode::FAILURE
        }
    }
}
