//! Configuration loading and management
//!
//! Configuration is resolved from three layers, highest precedence first:
//!
//! 1. Explicit values in `~/.config/pointledger/config.toml`
//! 2. `POINTLEDGER_*` environment variables
//! 3. Built-in defaults
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/pointledger/` (~/.config/pointledger/)
//! - Data: `$XDG_DATA_HOME/pointledger/` (~/.local/share/pointledger/)
//! - State/Logs: `$XDG_STATE_HOME/pointledger/` (~/.local/state/pointledger/)
//!
//! Resolution always produces a usable configuration, with one exception:
//! selecting the `networked` storage mode without a connection target is a
//! startup error.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

// ============================================
// Resolved configuration
// ============================================

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Process-wide in-memory store
    Memory,
    /// File-backed SQLite store
    Embedded,
    /// Pooled PostgreSQL store
    Networked,
}

impl StorageMode {
    /// Returns the identifier used in config files and environment variables
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Memory => "memory",
            StorageMode::Embedded => "embedded",
            StorageMode::Networked => "networked",
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "memory" => Ok(StorageMode::Memory),
            "embedded" => Ok(StorageMode::Embedded),
            "networked" => Ok(StorageMode::Networked),
            other => Err(format!("unknown storage mode: {}", other)),
        }
    }
}

/// Immutable configuration snapshot
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Which backend to use
    pub mode: StorageMode,
    /// Connection URL for the networked backend
    pub database_url: Option<String>,
    /// Database file path for the embedded backend
    pub database_path: PathBuf,
    /// Minimum idle connections kept by the networked pool
    pub pool_min: u32,
    /// Maximum concurrent connections in the networked pool
    pub pool_max: u32,
    /// Acquisition attempts before giving up
    pub max_retries: u32,
    /// Fixed delay between acquisition attempts, in milliseconds
    pub retry_delay_ms: u64,
}

impl StorageConfig {
    /// Fails fast on combinations that cannot produce a working store.
    pub fn validate(&self) -> Result<()> {
        if self.mode == StorageMode::Networked {
            if self.database_url.is_none() {
                return Err(Error::Config(
                    "storage.database_url is required for networked mode".to_string(),
                ));
            }
            if self.pool_max == 0 || self.pool_min > self.pool_max {
                return Err(Error::Config(format!(
                    "invalid pool bounds: min {} / max {}",
                    self.pool_min, self.pool_max
                )));
            }
        }
        Ok(())
    }

    /// Retry policy for connection acquisition
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

// ============================================
// File layer
// ============================================

/// Raw contents of `config.toml`; every field optional so that
/// unset fields fall through to environment and defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// `[storage]` section
    #[serde(default)]
    pub storage: StorageFileSection,
    /// `[logging]` section
    #[serde(default)]
    pub logging: LoggingFileSection,
}

/// `[storage]` section of the config file
#[derive(Debug, Default, Deserialize)]
pub struct StorageFileSection {
    /// Storage mode override
    pub mode: Option<String>,
    /// Connection URL override
    pub database_url: Option<String>,
    /// Database file path override
    pub database_path: Option<PathBuf>,
    /// Pool minimum override
    pub pool_min: Option<u32>,
    /// Pool maximum override
    pub pool_max: Option<u32>,
    /// Retry count override
    pub max_retries: Option<u32>,
    /// Retry delay override
    pub retry_delay_ms: Option<u64>,
}

/// `[logging]` section of the config file
#[derive(Debug, Default, Deserialize)]
pub struct LoggingFileSection {
    /// Log level override
    pub level: Option<String>,
}

fn default_mode() -> StorageMode {
    StorageMode::Embedded
}

fn default_pool_min() -> u32 {
    1
}

fn default_pool_max() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path, the environment, and defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let file = if config_path.exists() {
            Self::read_file(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            ConfigFile::default()
        };

        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let file = Self::read_file(path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn read_file(path: &PathBuf) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Resolve the three layers into a snapshot and validate it.
    ///
    /// `env` is an injected lookup so tests can resolve without touching
    /// process state.
    pub fn resolve<E>(file: ConfigFile, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mode = match file
            .storage
            .mode
            .or_else(|| env("POINTLEDGER_STORAGE_MODE"))
        {
            Some(raw) => raw.parse::<StorageMode>().map_err(Error::Config)?,
            None => default_mode(),
        };

        let database_url = file
            .storage
            .database_url
            .or_else(|| env("POINTLEDGER_DATABASE_URL"));

        let database_path = file
            .storage
            .database_path
            .or_else(|| env("POINTLEDGER_DATABASE_PATH").map(PathBuf::from))
            .unwrap_or_else(Self::database_path);

        let pool_min = resolve_number(file.storage.pool_min, env("POINTLEDGER_POOL_MIN"))?
            .unwrap_or_else(default_pool_min);
        let pool_max = resolve_number(file.storage.pool_max, env("POINTLEDGER_POOL_MAX"))?
            .unwrap_or_else(default_pool_max);
        let max_retries = resolve_number(file.storage.max_retries, env("POINTLEDGER_MAX_RETRIES"))?
            .unwrap_or_else(default_max_retries);
        let retry_delay_ms =
            resolve_number(file.storage.retry_delay_ms, env("POINTLEDGER_RETRY_DELAY_MS"))?
                .unwrap_or_else(default_retry_delay_ms);

        let level = file
            .logging
            .level
            .or_else(|| env("POINTLEDGER_LOG_LEVEL"))
            .unwrap_or_else(default_log_level);

        let config = Config {
            storage: StorageConfig {
                mode,
                database_url,
                database_path,
                pool_min,
                pool_max,
                max_retries,
                retry_delay_ms,
            },
            logging: LoggingConfig { level },
        };

        config.storage.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/pointledger/config.toml` (~/.config/pointledger/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("pointledger").join("config.toml")
    }

    /// Returns the data directory path (for the embedded database)
    ///
    /// `$XDG_DATA_HOME/pointledger/` (~/.local/share/pointledger/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("pointledger")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/pointledger/` (~/.local/state/pointledger/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("pointledger")
    }

    /// Returns the default embedded database file path
    ///
    /// `$XDG_DATA_HOME/pointledger/pointledger.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("pointledger.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/pointledger/pointledger.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("pointledger.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path
    /// behavior before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

fn resolve_number<N>(file_value: Option<N>, env_value: Option<String>) -> Result<Option<N>>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    if file_value.is_some() {
        return Ok(file_value);
    }
    match env_value {
        Some(raw) => raw
            .trim()
            .parse::<N>()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid numeric value {:?}: {}", raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(ConfigFile::default(), no_env).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Embedded);
        assert!(config.storage.database_url.is_none());
        assert_eq!(config.storage.pool_min, 1);
        assert_eq!(config.storage.pool_max, 10);
        assert_eq!(config.storage.max_retries, 3);
        assert_eq!(config.storage.retry_delay_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides_default() {
        let env = |key: &str| match key {
            "POINTLEDGER_STORAGE_MODE" => Some("memory".to_string()),
            "POINTLEDGER_MAX_RETRIES" => Some("5".to_string()),
            _ => None,
        };
        let config = Config::resolve(ConfigFile::default(), env).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Memory);
        assert_eq!(config.storage.max_retries, 5);
    }

    #[test]
    fn test_file_overrides_env() {
        let file: ConfigFile = toml::from_str(
            r#"
[storage]
mode = "networked"
database_url = "postgres://ledger@db/points"
pool_max = 4
"#,
        )
        .unwrap();
        let env = |key: &str| match key {
            "POINTLEDGER_STORAGE_MODE" => Some("memory".to_string()),
            "POINTLEDGER_POOL_MAX" => Some("32".to_string()),
            _ => None,
        };
        let config = Config::resolve(file, env).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Networked);
        assert_eq!(
            config.storage.database_url.as_deref(),
            Some("postgres://ledger@db/points")
        );
        assert_eq!(config.storage.pool_max, 4);
    }

    #[test]
    fn test_networked_requires_target() {
        let file: ConfigFile = toml::from_str(
            r#"
[storage]
mode = "networked"
"#,
        )
        .unwrap();
        let err = Config::resolve(file, no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_pool_bounds() {
        let file: ConfigFile = toml::from_str(
            r#"
[storage]
mode = "networked"
database_url = "postgres://ledger@db/points"
pool_min = 8
pool_max = 2
"#,
        )
        .unwrap();
        assert!(matches!(
            Config::resolve(file, no_env),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        let env = |key: &str| match key {
            "POINTLEDGER_STORAGE_MODE" => Some("cloud".to_string()),
            _ => None,
        };
        assert!(matches!(
            Config::resolve(ConfigFile::default(), env),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config::resolve(ConfigFile::default(), no_env).unwrap();
        let policy = config.storage.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(1000));
    }
}
