//! Client configuration
//!
//! Precedence: command-line flag > environment > YAML file > defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, MESSAGE_POLL_INTERVAL,
    NOTIFICATION_POLL_INTERVAL, SESSION_FILE,
};

pub const ENV_API_URL: &str = "BREAKDOWN_BUDDY_API_URL";
pub const ENV_SESSION: &str = "BREAKDOWN_BUDDY_SESSION";
pub const ENV_TIMEOUT: &str = "BREAKDOWN_BUDDY_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub timeout_secs: u64,
    pub message_poll_secs: u64,
    pub notification_poll_secs: u64,
    pub session_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: String::from(DEFAULT_API_URL),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            message_poll_secs: MESSAGE_POLL_INTERVAL.as_secs(),
            notification_poll_secs: NOTIFICATION_POLL_INTERVAL.as_secs(),
            session_path: config_dir().join(SESSION_FILE),
        }
    }
}

/// `~/.breakdown-buddy`, or `./.breakdown-buddy` without a home directory
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

impl Config {
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    /// Load from YAML; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, such as the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(path) = lookup(ENV_SESSION) {
            self.session_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_TIMEOUT} must be a number")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url is empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be non-zero".into()));
        }
        if self.message_poll_secs == 0 || self.notification_poll_secs == 0 {
            return Err(ConfigError::Invalid("poll intervals must be non-zero".into()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_url.trim().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn message_poll_interval(&self) -> Duration {
        Duration::from_secs(self.message_poll_secs)
    }

    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs)
    }
}
