use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use url::Url;

use common::onion::RequestConfig;
use common::path_manager::PathManagerConfig;

/// Service configuration, read from a TOML document
///
/// ```toml
/// sqlite_path = "/var/lib/onionpath/paths.db"
/// log_level = "debug"
///
/// [paths]
/// path_count = 2
/// path_size = 3
///
/// [requests]
/// max_attempts = 3
/// retry_delay_ms = 250
///
/// [clock]
/// time_source_url = "https://time.example.org/now"
/// ```
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathManagerConfig,
    pub requests: RequestConfig,
    pub clock: ClockConfig,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // misc
    #[serde_as(as = "DisplayFromStr")]
    pub log_level: tracing::Level,
    /// directory for daily rolling log files,
    ///  if not set logs only go to stdout
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathManagerConfig::default(),
            requests: RequestConfig::default(),
            clock: ClockConfig::default(),
            sqlite_path: None,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Where network time comes from when a destination reports clock skew
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Endpoint answering `{"timestamp": <unix ms>}`,
    ///  if not set resyncs always fail
    pub time_source_url: Option<Url>,
    pub timeout_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_source_url: None,
            timeout_ms: 5_000,
        }
    }
}

impl ClockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
