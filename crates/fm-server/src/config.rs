//! Daemon configuration loading from file and environment variables.

use fm_db::DbRuntimeSettings;
use fm_types::DEFAULT_EVENT_LOG_MAX_SIZE;
use serde::Deserialize;
use thiserror::Error;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event log retention settings.
    #[serde(default)]
    pub event_log: EventLogConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    #[serde(default = "default_wal_autocheckpoint_pages")]
    pub wal_autocheckpoint_pages: u32,
}

impl DatabaseConfig {
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
            wal_autocheckpoint_pages: self.wal_autocheckpoint_pages,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "fm_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Event log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventLogConfig {
    /// Maximum number of entries kept in the event log.
    #[serde(default = "default_event_log_max_size")]
    pub max_size: u64,

    /// Seconds between retention sweeps. Zero disables the sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_db_path() -> String {
    "fm.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_wal_autocheckpoint_pages() -> u32 {
    DbRuntimeSettings::default().wal_autocheckpoint_pages
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_log_max_size() -> u64 {
    DEFAULT_EVENT_LOG_MAX_SIZE
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            wal_autocheckpoint_pages: default_wal_autocheckpoint_pages(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            max_size: default_event_log_max_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `FM_DB_PATH` overrides `database.path`
/// - `FM_LOG_LEVEL` overrides `logging.level`
/// - `FM_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `FM_EVENT_LOG_MAX_SIZE` overrides `event_log.max_size`
/// - `FM_RETENTION_INTERVAL_SECS` overrides `event_log.sweep_interval_secs`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    let config = apply_overrides(config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies `FM_*` overrides read through `lookup`. Unparseable numeric
/// values are ignored with a warning.
pub fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(db_path) = lookup("FM_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("FM_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("FM_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(max_size) = lookup("FM_EVENT_LOG_MAX_SIZE") {
        match max_size.parse() {
            Ok(parsed) => config.event_log.max_size = parsed,
            Err(_) => tracing::warn!(value = %max_size, "ignoring invalid FM_EVENT_LOG_MAX_SIZE"),
        }
    }
    if let Some(interval) = lookup("FM_RETENTION_INTERVAL_SECS") {
        match interval.parse() {
            Ok(parsed) => config.event_log.sweep_interval_secs = parsed,
            Err(_) => {
                tracing::warn!(value = %interval, "ignoring invalid FM_RETENTION_INTERVAL_SECS")
            }
        }
    }
    config
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.event_log.max_size == 0 {
        return Err(ConfigError::Invalid(
            "event_log.max_size must be at least 1".to_string(),
        ));
    }
    if config.database.pool_max_size == 0 {
        return Err(ConfigError::Invalid(
            "database.pool_max_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}
