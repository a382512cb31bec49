//! Detector configuration.
//!
//! Values are layered with figment: built-in defaults, then an optional TOML
//! file, then `EIGER_`-prefixed environment variables.
//!
//! ```toml
//! address = "10.42.0.12"
//! name_pattern = "scan_$id"
//! latency_s = 0.0002
//! ```

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Environment variable prefix (`EIGER_ADDRESS`, `EIGER_LATENCY_S`, ...).
pub const ENV_PREFIX: &str = "EIGER_";

/// Error types for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Parse error (invalid TOML or wrong field types)
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Validation error
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Settings applied when the detector is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EigerConfig {
    /// Detector server address (host or IP)
    pub address: String,
    /// Skip API version discovery and use this version
    pub api_version: Option<String>,
    /// File writer name pattern; `$id` is replaced by the series number
    pub name_pattern: String,
    /// Force compression off for the session and restore it on close
    pub disable_compression: bool,
    /// Turn auto summation off on open
    pub disable_auto_summation: bool,
    /// Initial latency term of the frame time, in seconds
    pub latency_s: f64,
}

impl Default for EigerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            api_version: None,
            name_pattern: "series_$id".to_string(),
            disable_compression: true,
            disable_auto_summation: true,
            latency_s: 0.0,
        }
    }
}

impl EigerConfig {
    /// Config for `address` with every other field at its default.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Provider stack: defaults, optional TOML file, environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate. A `path` that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigLoadError::NotFound(path.display().to_string()).into());
            }
            debug!("Loading Eiger config from: {}", path.display());
        }

        let config: Self = Self::figment(path)
            .extract()
            .map_err(|e| ConfigLoadError::ParseError(e.to_string()))
            .context("Failed to load Eiger config")?;
        config.validate()?;
        Ok(config)
    }

    /// Build from a device-registry TOML table, filling gaps with defaults.
    pub fn from_toml(value: &toml::Value) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Serialized::defaults(value))
            .extract()
            .map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.address.trim().is_empty() {
            return Err(ConfigLoadError::ValidationError(
                "address must not be empty".to_string(),
            ));
        }
        if !self.latency_s.is_finite() || self.latency_s < 0.0 {
            return Err(ConfigLoadError::ValidationError(format!(
                "latency_s must be a non-negative number of seconds, got {}",
                self.latency_s
            )));
        }
        if self.name_pattern.is_empty() {
            return Err(ConfigLoadError::ValidationError(
                "name_pattern must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
