//! Client configuration.
//!
//! Stored as RON at `<config_dir>/janus/client.ron`. Every field has a
//! default, so a partial or missing file is fine:
//!
//! ```ron
//! (
//!     server_url: "http://localhost:8888",
//!     timeout_ms: 5000,
//!     track_history: false,
//! )
//! ```
//!
//! `JANUS_SERVER_URL` and `JANUS_TIMEOUT_MS` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    API_PREFIX, CONFIG_DIR_NAME, CONFIG_FILE, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT, ENV_SERVER_URL,
    ENV_TIMEOUT_MS,
};
use crate::error::ConfigError;

/// Where and how to reach the persistence server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub api_prefix: String,
    pub timeout_ms: u64,
    /// Default `track_history` for notebooks that don't carry the flag.
    pub track_history: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_prefix: API_PREFIX.to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            track_history: true,
        }
    }
}

impl ClientConfig {
    /// `<config_dir>/janus/client.ron`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::default_path() {
            Ok(path) => Self::load_from(&path)?,
            Err(ConfigError::NoConfigDir) => Self::default(),
            Err(e) => return Err(e),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: ClientConfig = ron::from_str(&text)?;
                tracing::debug!(path = %path.display(), "loaded client config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no client config, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write as pretty RON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (the process environment in [`load`](Self::load)).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|s| !s.trim().is_empty()) {
            self.server_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_TIMEOUT_MS,
                value: raw.clone(),
            })?;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Endpoint for one notebook: `<server><prefix>/<notebook_path>`.
    pub fn endpoint(&self, notebook_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.server_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/'),
            notebook_path.trim_start_matches('/')
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
