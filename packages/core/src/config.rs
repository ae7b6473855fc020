//! Runtime configuration
//!
//! Built once at startup from the process environment, after loading any
//! `.env` file in the working directory.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FLASH_URL: &str = "http://localhost:8080";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DAILY_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 180;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn invalid_value(key: &str, value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockchainConfig {
    pub flash_url: String,
    pub flash_service_key: String,
    pub data_dir: PathBuf,
    /// libsql database file; the in-memory backend is used when unset
    pub database_path: Option<PathBuf>,
    pub debug: bool,
    pub daily_cron_enabled: bool,
    pub daily_interval: Duration,
    pub generation_timeout: Duration,
}

impl Default for ClockchainConfig {
    fn default() -> Self {
        Self {
            flash_url: DEFAULT_FLASH_URL.to_string(),
            flash_service_key: String::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_path: None,
            debug: false,
            daily_cron_enabled: false,
            daily_interval: Duration::from_secs(DEFAULT_DAILY_INTERVAL_SECS),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, raw, "a boolean")),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::invalid_value(key, raw, "a whole number of seconds"))
}

impl ClockchainConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("FLASH_URL").filter(|v| !v.trim().is_empty()) {
            config.flash_url = url.trim().to_string();
        }
        if let Some(key) = lookup("FLASH_SERVICE_KEY") {
            config.flash_service_key = key;
        }
        if let Some(dir) = lookup("DATA_DIR").filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        config.database_path = lookup("DATABASE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        if let Some(raw) = lookup("DEBUG") {
            config.debug = parse_bool("DEBUG", &raw)?;
        }
        if let Some(raw) = lookup("DAILY_CRON_ENABLED") {
            config.daily_cron_enabled = parse_bool("DAILY_CRON_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("DAILY_INTERVAL_SECS") {
            config.daily_interval = parse_secs("DAILY_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("GENERATION_TIMEOUT_SECS") {
            config.generation_timeout = parse_secs("GENERATION_TIMEOUT_SECS", &raw)?;
        }

        Ok(config)
    }

    /// Seed document loaded into an empty graph
    pub fn seed_file(&self) -> PathBuf {
        self.data_dir.join("seeds.json")
    }

    /// `debug` when `DEBUG` is set, `info` otherwise
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(ClockchainConfig::from_lookup(|_| None));
        assert_eq!(config, ClockchainConfig::default());
        assert_eq!(config.flash_url, "http://localhost:8080");
        assert!(config.database_path.is_none());
        assert_eq!(config.daily_interval, Duration::from_secs(86_400));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_overrides() {
        let config = ClockchainConfig::from_lookup(lookup_from(&[
            ("FLASH_URL", "https://flash.example.com"),
            ("FLASH_SERVICE_KEY", "secret"),
            ("DATA_DIR", "/var/lib/clockchain"),
            ("DATABASE_PATH", "/var/lib/clockchain/graph.db"),
            ("DEBUG", "true"),
            ("DAILY_CRON_ENABLED", "1"),
            ("DAILY_INTERVAL_SECS", "3600"),
            ("GENERATION_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.flash_service_key, "secret");
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/clockchain/graph.db"))
        );
        assert!(config.debug);
        assert!(config.daily_cron_enabled);
        assert_eq!(config.daily_interval, Duration::from_secs(3600));
        assert_eq!(config.generation_timeout, Duration::from_secs(30));
        assert_eq!(
            config.seed_file(),
            PathBuf::from("/var/lib/clockchain/seeds.json")
        );
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = assert_err!(ClockchainConfig::from_lookup(lookup_from(&[(
            "DAILY_INTERVAL_SECS",
            "daily"
        )])));
        assert!(err.to_string().contains("DAILY_INTERVAL_SECS"));

        let err = assert_err!(ClockchainConfig::from_lookup(lookup_from(&[("DEBUG", "perhaps")])));
        assert_eq!(err, ConfigError::invalid_value("DEBUG", "perhaps", "a boolean"));
    }
}
