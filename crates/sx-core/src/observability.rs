//! Observability infrastructure.
//!
//! Structured logging with consistent spans across the provisioning crates.

use std::str::FromStr;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(Error::InvalidInput(format!(
                "log format must be one of: json, pretty (got {other})"
            ))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `sx_provision=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates the span covering one provisioning invocation.
///
/// # Example
///
/// ```rust
/// use sx_core::observability::provisioning_span;
///
/// let span = provisioning_span("provision", "01J0000000000000000000000", 42, "eu-pool");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn provisioning_span(
    operation: &str,
    invocation_id: &str,
    project_id: u64,
    resource_pool_id: &str,
) -> Span {
    tracing::info_span!(
        "provisioning",
        op = operation,
        invocation_id = invocation_id,
        project_id = project_id,
        resource_pool_id = resource_pool_id,
    )
}
