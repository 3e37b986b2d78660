//! Retry policy implementation with exponential backoff.
//!
//! The bootstrap is fail-fast by default: the default policy performs no
//! retries at all. Callers opt in to a bounded number of attempts, and only
//! errors that classify themselves as transient are ever retried.

use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// Classification of an error as transient or permanent.
pub trait Retryable {
    /// Whether a repeat of the failed operation could succeed.
    fn is_retryable(&self) -> bool;
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first failure
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(RetryConfig::default().with_max_retries(0))
    }

    /// Calculate the delay for a given attempt number.
    ///
    /// Uses exponential backoff with optional jitter.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt as i32);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            // Up to 25% jitter
            let jitter_factor = 1.0 + (rand::random::<f64>() * 0.25);
            delay_ms * jitter_factor
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Check if an error should be retried.
    #[must_use]
    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Execute an async operation with retries.
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or the last transient error once
    /// retries are exhausted.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}
