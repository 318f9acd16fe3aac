//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/linrelay/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/linrelay/` (~/.config/linrelay/)
//! - State/Logs: `$XDG_STATE_HOME/linrelay/` (~/.local/state/linrelay/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracker API configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracker API configuration
///
/// Token acquisition is out of scope here: the key is read from config or
/// the `LINRELAY_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Tracker server URL (e.g., `https://tracker.example.com/api`)
    pub server_url: Option<String>,

    /// API key for the tracker
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_tracker_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_tracker_max_retries")]
    pub max_retries: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            timeout_secs: default_tracker_timeout(),
            max_retries: default_tracker_max_retries(),
        }
    }
}

impl TrackerConfig {
    /// The API key, with the environment variable taking precedence.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("LINRELAY_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_none() {
            return Err(Error::Config("tracker.server_url is required".to_string()));
        }
        if self.resolved_api_key().is_none() {
            return Err(Error::Config(
                "tracker.api_key (or LINRELAY_API_KEY) is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_tracker_timeout() -> u64 {
    30
}

fn default_tracker_max_retries() -> usize {
    3
}

/// Watcher configuration
#[derive(Debug, Deserialize)]
pub struct WatcherConfig {
    /// Poll interval in milliseconds when no file yielded new bytes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Override path for the Claude Code projects directory
    pub projects_dir: Option<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            projects_dir: None,
        }
    }
}

impl WatcherConfig {
    /// The journal root: the override, or `~/.claude/projects`.
    pub fn projects_dir(&self) -> PathBuf {
        self.projects_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude").join("projects"))
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/linrelay/config.toml` (~/.config/linrelay/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("linrelay").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/linrelay/` (~/.local/state/linrelay/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("linrelay")
    }
}
