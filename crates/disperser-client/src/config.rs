//! # Disperser Client Configuration
//!
//! Connection target and deadlines for the disperser client.
//!
//! ```toml
//! hostname = "disperser.example.net"
//! port = 443
//! timeout = "45s"
//! use_secure_transport = true
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Deadline for `GetBlobStatus`, `RetrieveBlob` and `GetPaymentState`.
///
/// Not configurable: these reads are cheap and get a generous fixed bound.
pub const STATUS_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Disperser client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisperserConfig {
    /// Disperser host name or IP address.
    pub hostname: String,
    /// Disperser port.
    pub port: u16,
    /// Deadline for one dispersal call, the whole authenticated exchange included.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Require an encrypted transport.
    pub use_secure_transport: bool,
    /// Deadline for establishing the shared connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for DisperserConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 32001,
            timeout: Duration::from_secs(30),
            use_secure_transport: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DisperserConfig {
    /// Build a config for `hostname:port`, everything else default.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ..Self::default()
        }
    }

    /// Create a config for testing (short deadlines).
    pub fn for_testing() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 32001,
            timeout: Duration::from_secs(2),
            use_secure_transport: false,
            connect_timeout: Duration::from_secs(1),
        }
    }

    /// Parse from TOML and validate.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::InvalidHostname);
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "dispersal timeout cannot be 0".into(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// `host:port` dial target.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Hostname missing or blank
    #[error("hostname cannot be empty")]
    InvalidHostname,
    /// Port 0 was configured
    #[error("port cannot be 0")]
    InvalidPort,
    /// A deadline was zero
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// TOML could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(String),
}
