//! Shared plumbing for the azkvbs crates.
//!
//! This crate provides centralized implementations for:
//! - HTTP client configuration and building
//! - Bounded retry with exponential backoff for transient failures
//! - Tracing subscriber initialisation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod retry;
pub mod tracing_config;

pub use http::{HttpConfig, build_http_client};
pub use retry::{RetryConfig, RetryPolicy, Retryable};
pub use tracing_config::{TracingConfig, init_tracing};
