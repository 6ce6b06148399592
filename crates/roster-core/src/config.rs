//! Configuration for a Roster session.

use crate::error::{Result, RosterError};
use crate::view::GroupKeyPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Directory holding config and the record file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Record file used by the file-backed service
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Quiet window before a search term change recomputes the view
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How course names are folded into group keys
    #[serde(default)]
    pub group_keys: GroupKeyPolicy,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Buffered notifications per subscriber
    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".roster")
}

fn default_data_file() -> PathBuf {
    default_data_dir().join("students.json")
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_notice_capacity() -> usize {
    16
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            data_file: default_data_file(),
            debounce_ms: default_debounce_ms(),
            group_keys: GroupKeyPolicy::default(),
            log_level: default_log_level(),
            notice_capacity: default_notice_capacity(),
        }
    }
}

impl RosterConfig {
    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let config_path = default_data_dir().join("config.yaml");

        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RosterError::Config(format!("{}: {}", path.display(), e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| RosterError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Ensure the data directory exists
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.data_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
