//! FSM configuration loaded from environment variables.

use dbot_core::{DbotError, Result};
use fsm_core::{StorageOptions, DEFAULT_MAX_DATA_SIZE};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Backend selected by `FSM_STORAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Redis,
    Mongo,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Redis => "redis",
            StorageBackend::Mongo => "mongo",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = DbotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            other => Err(DbotError::Config(format!(
                "FSM_STORAGE must be one of memory, redis, mongo; got '{}'",
                other
            ))),
        }
    }
}

/// FSM configuration.
///
/// | Variable | Default |
/// |----------|---------|
/// | `FSM_STORAGE` | `memory` |
/// | `FSM_REDIS_URL` | `redis://127.0.0.1:6379` |
/// | `FSM_KEY_PREFIX` | empty |
/// | `FSM_MONGO_URI` | `mongodb://127.0.0.1:27017` |
/// | `FSM_MONGO_DATABASE` | `fsm_storage` |
/// | `FSM_MONGO_COLLECTION` | `states` |
/// | `FSM_DEFAULT_TTL_SECS` | unset |
/// | `FSM_MAX_DATA_SIZE` | `1048576` |
/// | `FSM_CREATE_IF_MISSING` | `false` |
/// | `LOG_FILE` | `logs/dbot-fsm.log` |
#[derive(Debug, Clone, PartialEq)]
pub struct FsmConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub mongo_collection: String,
    pub options: StorageOptions,
    pub log_file: String,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            mongo_uri: "mongodb://127.0.0.1:27017".to_string(),
            mongo_database: "fsm_storage".to_string(),
            mongo_collection: "states".to_string(),
            options: StorageOptions::default(),
            log_file: "logs/dbot-fsm.log".to_string(),
        }
    }
}

impl FsmConfig {
    /// Loads from the environment; unset variables take the defaults, malformed ones are a
    /// [`DbotError::Config`].
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let backend = match env::var("FSM_STORAGE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.backend,
        };
        let default_ttl = parse_var::<u64>("FSM_DEFAULT_TTL_SECS")?.map(Duration::from_secs);
        let max_data_size =
            parse_var::<usize>("FSM_MAX_DATA_SIZE")?.unwrap_or(DEFAULT_MAX_DATA_SIZE);
        if max_data_size == 0 {
            return Err(DbotError::Config(
                "FSM_MAX_DATA_SIZE must be greater than zero".to_string(),
            ));
        }
        let create_if_missing = match env::var("FSM_CREATE_IF_MISSING") {
            Ok(raw) => parse_bool("FSM_CREATE_IF_MISSING", &raw)?,
            Err(_) => false,
        };

        Ok(Self {
            backend,
            redis_url: env::var("FSM_REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: env::var("FSM_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            mongo_uri: env::var("FSM_MONGO_URI").unwrap_or(defaults.mongo_uri),
            mongo_database: env::var("FSM_MONGO_DATABASE").unwrap_or(defaults.mongo_database),
            mongo_collection: env::var("FSM_MONGO_COLLECTION")
                .unwrap_or(defaults.mongo_collection),
            options: StorageOptions::default()
                .with_max_data_size(max_data_size)
                .with_default_ttl(default_ttl)
                .with_create_if_missing(create_if_missing),
            log_file: env::var("LOG_FILE").unwrap_or(defaults.log_file),
        })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| DbotError::Config(format!("{} '{}': {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DbotError::Config(format!(
            "{} must be a boolean; got '{}'",
            name, raw
        ))),
    }
}
