use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_READ_TIMEOUT_MS};

/// Activator settings, usually left at their defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivatorConfig {
    /// Explicit scope identity; the executable path hash is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    /// How long a follower waits for the leader's channel
    pub connect_timeout_ms: u64,
    /// How long the leader waits for one connection's payload
    pub read_timeout_ms: u64,
    /// Largest payload the leader accepts
    pub max_payload_bytes: usize,
    /// Directory for lock and socket files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_dir: Option<PathBuf>,
}

impl Default for ActivatorConfig {
    fn default() -> Self {
        Self {
            unique_name: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            runtime_dir: None,
        }
    }
}

impl ActivatorConfig {
    pub fn with_unique_name(mut self, name: impl Into<String>) -> Self {
        self.unique_name = Some(name.into());
        self
    }

    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Load config from a TOML file; `None` when the file does not exist
pub fn load_config(path: &Path) -> Result<Option<ActivatorConfig>, CoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config: ActivatorConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save config as TOML, creating parent directories
pub fn save_config(path: &Path, config: &ActivatorConfig) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
