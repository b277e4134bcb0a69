//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or a full `EnvFilter` directive)
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Include the module target in each line
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "disperser-client".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `DISPERSER_SERVICE_NAME`: Service name (default: disperser-client)
    /// - `DISPERSER_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `DISPERSER_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: env::var("DISPERSER_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("DISPERSER_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: env::var("DISPERSER_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.json_logs),

            with_target: defaults.with_target,
        }
    }

    /// Verbose console logging for tests.
    pub fn for_testing() -> Self {
        Self {
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }
}
