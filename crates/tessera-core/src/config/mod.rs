//! Configuration management for Tessera.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file only needs
//! to name the values it overrides.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Tessera.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tile size and binarization settings
    pub tiling: TilingConfig,

    /// Detection service settings
    pub detector: DetectorConfig,

    /// Input discovery settings
    pub input: InputConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Job report settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// A leading `~` in the path is expanded to the home directory.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let path = expand_path(path);
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.tessera.tessera/config.toml
    /// - Linux: ~/.config/tessera/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\tessera\config\config.toml
    ///
    /// Falls back to ~/.tessera/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tessera", "tessera")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".tessera").join("config.toml")
            })
    }

    /// Full URL of the detection endpoint.
    pub fn detect_url(&self) -> String {
        self.detector.url(&self.detector.detect_path)
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        self.detector.url(&self.detector.health_path)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}
