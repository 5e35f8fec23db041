//! Configuration for the to-do demo

use std::path::{Path, PathBuf};
use std::time::Duration;

use libstatebus::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingSection,
    pub todo: TodoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoConfig {
    /// Simulated save latency of `add_todo`
    pub save_delay_ms: u64,
    /// How long an info/error message stays before it is cleared
    pub message_ttl_ms: u64,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
        }
    }
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            save_delay_ms: 1300,
            message_ttl_ms: 3000,
        }
    }
}

impl TodoConfig {
    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    pub fn message_ttl(&self) -> Duration {
        Duration::from_millis(self.message_ttl_ms)
    }
}

impl Config {
    /// Load from the default location, or use defaults if no file exists
    pub fn load() -> Result<Self, ConfigError> {
        let path = resolve_config_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Load from a specific file, which must exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// `STATEBUS_TODO_CONFIG` if set, else `<config dir>/statebus/todo.toml`
pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("STATEBUS_TODO_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("statebus").join("todo.toml"))
}
