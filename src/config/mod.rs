//! Configuration module for trackstream
//!
//! This module handles the settings shared by the streaming engines and the
//! CLI:
//! - Metric trace sizing and flush granularity
//! - Progress frame reporting
//! - CSV export chunking
//! - Channel sink buffering
//! - Default log filter
//!
//! # Config Location
//!
//! The default config file lives in the platform config directory:
//! - **Linux**: `~/.config/trackstream/config.toml`
//! - **macOS**: `~/Library/Application Support/trackstream/config.toml`
//! - **Windows**: `%APPDATA%\trackstream\config.toml`
//!
//! Files ending in `.json` are read as JSON; everything else as TOML.
//!
//! # Example
//!
//! ```
//! use trackstream::config::{FlushPolicy, StreamConfig};
//!
//! let mut config = StreamConfig::load_or_default(None);
//! config.metrics.flush = FlushPolicy::PerGroup;
//! assert!(config.validate().is_ok());
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the platform config dir
pub const APP_DIR: &str = "trackstream";

/// Default config filename
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Config Directory ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Stream Config ====================

/// On-disk file format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Settings for all streaming engines
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub metrics: MetricSettings,
    pub progress: ProgressSettings,
    pub csv: CsvSettings,
    pub sink: SinkSettings,
    pub logging: LoggingSettings,
}

impl StreamConfig {
    /// Load config from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| StreamError::Config(format!("Failed to parse config: {}", e)))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| StreamError::Config(format!("Failed to parse config: {}", e)))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults. An explicit path must load.
    pub fn try_load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Like [`StreamConfig::try_load`], but failures are logged and defaults
    /// are returned.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to a file, in the format implied by its extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| StreamError::Config(format!("Failed to serialize config: {}", e)))?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| StreamError::Config(format!("Failed to serialize config: {}", e)))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StreamError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| StreamError::Config(format!("Failed to write config: {}", e)))
    }

    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.csv.chunk_size == 0 {
            return Err(StreamError::Config("csv.chunk_size must be positive".into()));
        }
        if self.sink.channel_depth == 0 {
            return Err(StreamError::Config(
                "sink.channel_depth must be positive".into(),
            ));
        }
        Ok(())
    }
}
