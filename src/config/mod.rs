//! Configuration management for the worldping scraper
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{SelectionFilter, IDLE_ACTIVITY};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory page configuration
    pub directory: DirectoryConfig,

    /// Latency prober configuration
    pub prober: ProberConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Directory page fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// URL of the world directory page
    pub url: String,

    /// Rate limit (requests per second)
    pub rate_limit: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Fixed user agent; rotated from a built-in pool when unset
    pub user_agent: Option<String>,
}

/// Probe scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Maximum number of probes in flight
    pub max_concurrent_probes: usize,

    /// Pause after a successful probe, held inside the concurrency slot
    pub pacing_interval_ms: u64,

    /// Per-probe request timeout in seconds
    pub request_timeout_secs: u64,

    /// Only probe members worlds
    pub members_only: bool,

    /// Locations eligible for probing
    pub target_locations: Vec<String>,

    /// Required activity text (empty string disables the check)
    pub activity: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Directory for the rolling log file; `None` disables file logging
    pub directory: Option<PathBuf>,

    /// Log file name prefix
    pub file_name: String,

    /// Number of rotated log files to keep
    pub max_files: usize,
}

/// Values given on the command line; they win over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_format: Option<String>,
    pub max_concurrent_probes: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(limit) = self.max_concurrent_probes {
            config.prober.max_concurrent_probes = limit;
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://oldschool.runescape.com/slu"),
            rate_limit: 2,
            request_timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 5,
            pacing_interval_ms: 1000,
            request_timeout_secs: 10,
            members_only: true,
            target_locations: vec![String::from("Germany"), String::from("United Kingdom")],
            activity: String::from(IDLE_ACTIVITY),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/world_data.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
            directory: Some(PathBuf::from("logs")),
            file_name: String::from("world_scraper.log"),
            max_files: 5,
        }
    }
}

impl ProberConfig {
    /// Pacing interval as Duration
    #[must_use]
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    /// Probe timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Selection predicate described by this configuration
    pub fn selection_filter(&self) -> SelectionFilter {
        SelectionFilter {
            members_only: self.members_only,
            locations: self.target_locations.clone(),
            activity: if self.activity.is_empty() {
                None
            } else {
                Some(self.activity.clone())
            },
        }
    }
}

impl DirectoryConfig {
    /// Directory request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional file, apply environment overrides, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &Overrides::default())
    }

    /// Like [`Config::load`], with command-line values applied last
    ///
    /// Validation runs once, after every layer has been applied.
    pub fn load_with(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply `WORLDPING_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("WORLDPING_DIRECTORY_URL") {
            self.directory.url = url;
        }
        if let Some(rate) = env_parse::<u32>("WORLDPING_RATE_LIMIT")? {
            self.directory.rate_limit = rate;
        }
        if let Ok(agent) = std::env::var("WORLDPING_USER_AGENT") {
            self.directory.user_agent = Some(agent);
        }
        if let Some(limit) = env_parse::<usize>("WORLDPING_MAX_CONCURRENT_PROBES")? {
            self.prober.max_concurrent_probes = limit;
        }
        if let Some(pacing) = env_parse::<u64>("WORLDPING_PACING_INTERVAL_MS")? {
            self.prober.pacing_interval_ms = pacing;
        }
        if let Some(timeout) = env_parse::<u64>("WORLDPING_PROBE_TIMEOUT")? {
            self.prober.request_timeout_secs = timeout;
        }
        if let Ok(locations) = std::env::var("WORLDPING_TARGET_LOCATIONS") {
            self.prober.target_locations = locations
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Ok(path) = std::env::var("WORLDPING_SQLITE_PATH") {
            self.database.sqlite_path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("WORLDPING_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("WORLDPING_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(dir) = std::env::var("WORLDPING_LOG_DIR") {
            self.logging.directory = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.directory.url.is_empty() {
            anyhow::bail!("directory.url must not be empty");
        }

        if self.directory.rate_limit == 0 {
            anyhow::bail!("directory.rate_limit must be greater than 0");
        }

        if self.directory.request_timeout_secs == 0 {
            anyhow::bail!("directory.request_timeout_secs must be greater than 0");
        }

        if self.prober.max_concurrent_probes == 0 {
            anyhow::bail!("prober.max_concurrent_probes must be greater than 0");
        }

        if self.prober.request_timeout_secs == 0 {
            anyhow::bail!("prober.request_timeout_secs must be greater than 0");
        }

        if self.prober.target_locations.is_empty() {
            anyhow::bail!("prober.target_locations must list at least one location");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        Err(_) => Ok(None),
    }
}
