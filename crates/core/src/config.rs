//! Server configuration schema and loader
//!
//! TOML-parseable; every field has a default so a missing or partial file
//! still yields a runnable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Runtime configuration for an alcove server process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the realtime listener binds, e.g. "0.0.0.0" or "::"
    pub bind_addr: String,
    /// Listener port; 0 picks an ephemeral port
    pub port: u16,
    /// Seconds an unconsumed invitation token stays redeemable
    pub token_ttl_secs: u64,
    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,
    /// Message sends admitted per connection per second
    pub send_rate_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            token_ttl_secs: 300,
            sweep_interval_secs: 60,
            send_rate_limit: 5,
        }
    }
}

impl ServerConfig {
    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse directly from TOML content (for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs as i64)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}
