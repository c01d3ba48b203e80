//! Bridge configuration.
//!
//! Supports loading from YAML files with environment variable overrides.
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Default minimum spacing between two reloads of the same playlist.
pub const DEFAULT_MIN_UPDATE_INTERVAL_MS: u64 = 1000;

/// Default period at which hosts are expected to call `on_tick`.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Configuration for the playbridge manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Minimum time between two debounced reloads of one playlist.
    /// Override: `PLAYBRIDGE_MIN_UPDATE_INTERVAL_MS`
    pub min_update_interval_ms: u64,

    /// Path to the SQLite playlist store. `None` keeps the store in memory.
    /// Override: `PLAYBRIDGE_DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Period at which the host drives the dispatch context.
    /// Override: `PLAYBRIDGE_TICK_INTERVAL_MS`
    pub tick_interval_ms: u64,

    /// Poll the engine on every tick for playback/track/status changes it
    /// does not announce itself.
    pub track_status_changes: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_update_interval_ms: DEFAULT_MIN_UPDATE_INTERVAL_MS,
            database_path: None,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            track_status_changes: true,
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the file cannot be read or
    /// parsed, or if the resulting values are invalid.
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                BridgeError::Configuration(format!(
                    "failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_yaml(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a YAML document.
    pub fn from_yaml(content: &str) -> BridgeResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| BridgeError::Configuration(format!("failed to parse config: {}", e)))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PLAYBRIDGE_MIN_UPDATE_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.min_update_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("PLAYBRIDGE_DATABASE_PATH") {
            if !val.is_empty() {
                self.database_path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("PLAYBRIDGE_TICK_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.tick_interval_ms = ms;
            }
        }
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(BridgeError::Configuration(
                "tick_interval_ms must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum update interval as a [`Duration`].
    #[must_use]
    pub fn min_update_interval(&self) -> Duration {
        Duration::from_millis(self.min_update_interval_ms)
    }

    /// Tick interval as a [`Duration`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
