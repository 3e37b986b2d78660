//! Tracing subscriber initialisation.
//!
//! Log output goes to stderr so that stdout stays free for anything a
//! provisioning script might want to capture.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter, overridden by `RUST_LOG` when set
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "azkvbs".to_string(),
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Set a custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set a custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Initialize tracing with the given configuration.
///
/// This sets up the global tracing subscriber with the specified configuration.
/// Should be called once at application startup.
pub fn init_tracing(config: &TracingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!(service = %config.service_name, "Tracing initialised");
}
