//! # Disperser Telemetry
//!
//! Observability plumbing for the disperser client.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an `EnvFilter`, console or JSON output
//! - **Metrics**: Prometheus counters for dispersals, payment paths, syncs and connections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use disperser_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! // Dispersal code here; logs and metrics are now collected.
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DISPERSER_SERVICE_NAME` | `disperser-client` | Service name attached to logs |
//! | `DISPERSER_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `DISPERSER_JSON_LOGS` | `false` | Emit JSON lines instead of human readable output |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{encode_metrics, register_metrics, MetricsHandle};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Configuration could not be interpreted.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so the registry is ready before anything logs about it
    let metrics = register_metrics()?;
    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!("Shutting down telemetry");
    }
}
