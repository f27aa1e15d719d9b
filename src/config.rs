//! Configuration management for ringlog

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::appender::display::{DEFAULT_FILTER, FILTER_DEBOUNCE};
use crate::appender::{DisplayOptions, NetworkConfig};
use crate::logging::{DEFAULT_CAPACITY, DEFAULT_LOGGER_NAME};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the logger the console attaches to
    #[serde(default = "default_logger_name")]
    pub logger_name: String,

    /// Number of entries the logger keeps (default: 1000)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Do not stamp entries with the time they were logged
    #[serde(default)]
    pub no_timestamp: bool,

    /// Static preamble shown above the entries
    #[serde(default)]
    pub header: Option<String>,

    /// Start the console with timestamps shown
    #[serde(default)]
    pub show_timestamps: bool,

    /// Delay between the last filter keystroke and the redraw (default: 200ms)
    #[serde(default = "default_filter_debounce_ms")]
    pub filter_debounce_ms: u64,

    /// Filter the console starts with (default: ".*")
    #[serde(default = "default_initial_filter")]
    pub initial_filter: String,

    /// Forward matching entries over HTTP when present
    #[serde(default)]
    pub network: Option<NetworkConfig>,
}

fn default_logger_name() -> String {
    DEFAULT_LOGGER_NAME.to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_filter_debounce_ms() -> u64 {
    FILTER_DEBOUNCE.as_millis() as u64
}

fn default_initial_filter() -> String {
    DEFAULT_FILTER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logger_name: default_logger_name(),
            capacity: default_capacity(),
            no_timestamp: false,
            header: None,
            show_timestamps: false,
            filter_debounce_ms: default_filter_debounce_ms(),
            initial_filter: default_initial_filter(),
            network: None,
        }
    }
}

impl Config {
    /// Load configuration from the default file, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Init arguments for the console's display appender
    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            show: true,
            timestamps: self.show_timestamps,
            filter: Some(self.initial_filter.clone()),
            debounce_ms: Some(self.filter_debounce_ms),
        }
    }
}

/// Get the base configuration directory (~/.ringlog)
/// Falls back to ./.ringlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".ringlog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ringlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure all required directories exist
pub fn ensure_directories() -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(logs_dir()).context("Failed to create logs directory")?;
    Ok(())
}
