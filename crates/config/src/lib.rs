// Configuration Management
//
// This crate handles all configuration loading for the Dangil API.
// It provides:
// - Configuration structs and deserialization
// - File loading logic with an environment fallback
// - Default configuration values
//
// This keeps configuration concerns separate from the auth core.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

const CONFIG_PATHS: [&str; 2] = ["config/config.yaml", "config.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration loading interface
impl ApiConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ApiConfig = serde_yaml::from_str(&content)?;
        config.auth.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Load configuration from the first config file found,
    /// otherwise from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        for path in &CONFIG_PATHS {
            if Path::new(path).exists() {
                return Self::load_from_file(path);
            }
        }

        let config = Self::from_env().map_err(ConfigError::Invalid)?;
        config.auth.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}
