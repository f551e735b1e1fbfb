//! Configuration
//!
//! JSON configuration for viewport size, cursor blink timing, and the shell
//! to spawn. A missing file is not an error; `load_or_default` falls back to
//! the built-in defaults so a fresh install works without any setup.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::BlinkTimings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which shell to spawn. With no program set, the platform default is used
/// (`$SHELL`, falling back to `/bin/sh`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub program: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Viewport height in rows
    pub rows: usize,
    /// Viewport width in columns
    pub cols: usize,
    /// Cursor drawn-phase duration in milliseconds
    pub blink_on_ms: u64,
    /// Cursor undrawn-phase duration in milliseconds
    pub blink_off_ms: u64,
    /// Blink hold time after cursor movement in milliseconds
    pub blink_pause_ms: u64,
    pub shell: ShellConfig,
}

impl Default for Config {
    fn default() -> Self {
        let timings = BlinkTimings::default();
        Self {
            rows: 24,
            cols: 80,
            blink_on_ms: timings.on.as_millis() as u64,
            blink_off_ms: timings.off.as_millis() as u64,
            blink_pause_ms: timings.pause.as_millis() as u64,
            shell: ShellConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Load from `path`, falling back to defaults when the file does not
    /// exist. Parse errors in an existing file are still reported.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn blink_timings(&self) -> BlinkTimings {
        BlinkTimings {
            on: Duration::from_millis(self.blink_on_ms),
            off: Duration::from_millis(self.blink_off_ms),
            pause: Duration::from_millis(self.blink_pause_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sensible() {
        let config = Config::default();
        assert_eq!(config.rows, 24);
        assert_eq!(config.cols, 80);
        assert!(config.shell.program.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.cols = 132;
        config.shell.program = Some("/bin/zsh".to_string());
        config.shell.args = vec!["-l".to_string()];

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_or_default(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"cols": 100}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cols, 100);
        assert_eq!(config.rows, 24);
    }

    #[test]
    fn blink_timings_convert_to_durations() {
        let mut config = Config::default();
        config.blink_on_ms = 250;
        let timings = config.blink_timings();
        assert_eq!(timings.on, Duration::from_millis(250));
    }
}
