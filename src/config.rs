//! Configuration loading for panemux.
//!
//! The configuration file lives at `~/.panemux/config.toml`. Every field is
//! optional:
//!
//! ```toml
//! # Shell to run in new panes (default: the login shell)
//! shell = "/bin/zsh"
//!
//! # trace, debug, info, warn, error; PANEMUX_LOG overrides
//! log_level = "info"
//!
//! # Ctrl+<key> starts a command
//! prefix_key = "b"
//!
//! [session]
//! cols = 80
//! rows = 30
//!
//! [resize]
//! debounce_ms = 40
//! settle_frames = 2
//! max_measure_retries = 5
//! retry_backoff_ms = 16
//!
//! [probe]
//! timeout_ms = 500
//!
//! [assistant]
//! command = "my-nl2sh --model small"
//! timeout_ms = 10000
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::assistant::{CommandTranslator, Translator, UnconfiguredTranslator};
use crate::core::cwd::home_dir;
use crate::core::session::RegistryOptions;
use crate::wm::manager::MuxOptions;
use crate::wm::resize::ResizeSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command for new panes
    pub shell: Option<String>,
    pub log_level: String,
    /// Letter combined with Ctrl to form the prefix
    pub prefix_key: String,
    pub session: SessionConfig,
    pub resize: ResizeConfig,
    pub probe: ProbeConfig,
    pub assistant: AssistantConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            log_level: "info".to_string(),
            prefix_key: "b".to_string(),
            session: SessionConfig::default(),
            resize: ResizeConfig::default(),
            probe: ProbeConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// Geometry of a session before its first measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cols: u16,
    pub rows: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { cols: 80, rows: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    pub debounce_ms: u64,
    pub settle_frames: u8,
    pub max_measure_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 40,
            settle_frames: 2,
            max_measure_retries: 5,
            retry_backoff_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// External translator; the assistant is disabled when unset
    pub command: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load `~/.panemux/config.toml`, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring config file");
                Self::default()
            }
        }
    }

    /// Load a specific file; errors are returned, not swallowed
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `~/.panemux`
    pub fn config_dir() -> PathBuf {
        home_dir().join(".panemux")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn log_path() -> PathBuf {
        Self::config_dir().join("panemux.log")
    }

    /// Prefix letter, lowercased; `b` if the setting is not a single letter
    pub fn prefix_char(&self) -> char {
        let mut chars = self.prefix_key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_lowercase(),
            _ => 'b',
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            shell: self.shell.clone(),
            cols: self.session.cols.max(1),
            rows: self.session.rows.max(1),
            probe_timeout: Duration::from_millis(self.probe.timeout_ms),
        }
    }

    pub fn resize_settings(&self) -> ResizeSettings {
        ResizeSettings {
            debounce: Duration::from_millis(self.resize.debounce_ms),
            settle_frames: self.resize.settle_frames,
            max_retries: self.resize.max_measure_retries,
            retry_backoff: Duration::from_millis(self.resize.retry_backoff_ms),
        }
    }

    pub fn mux_options(&self, initial_cwd: Option<PathBuf>) -> MuxOptions {
        MuxOptions {
            registry: self.registry_options(),
            resize: self.resize_settings(),
            initial_cwd,
        }
    }

    /// The configured assistant, or one that explains how to configure it
    pub fn translator(&self) -> Box<dyn Translator> {
        let timeout = Duration::from_millis(self.assistant.timeout_ms);
        match self
            .assistant
            .command
            .as_deref()
            .and_then(|cmd| CommandTranslator::new(cmd, timeout))
        {
            Some(translator) => Box::new(translator),
            None => Box::new(UnconfiguredTranslator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session.cols, 80);
        assert_eq!(config.session.rows, 30);
        assert_eq!(config.prefix_char(), 'b');
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            shell = "/bin/zsh"
            prefix_key = "A"

            [resize]
            debounce_ms = 100

            [assistant]
            command = "nl2sh --fast"
            "#,
        )
        .unwrap();

        assert_eq!(config.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(config.prefix_char(), 'a');
        let resize = config.resize_settings();
        assert_eq!(resize.debounce, Duration::from_millis(100));
        assert_eq!(resize.settle_frames, 2);
        assert_eq!(config.assistant.timeout_ms, 10_000);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            Config::parse("[session]\ncols = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_odd_prefix_falls_back() {
        let config = Config {
            prefix_key: "ab".to_string(),
            ..Config::default()
        };
        assert_eq!(config.prefix_char(), 'b');
    }

    #[test]
    fn test_zero_session_size_is_clamped() {
        let mut config = Config::default();
        config.session.cols = 0;
        let options = config.registry_options();
        assert_eq!(options.cols, 1);
        assert_eq!(options.rows, 30);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::load_from(Path::new("/nonexistent/panemux.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
