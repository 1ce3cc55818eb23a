//! Runtime configuration for the reaction core.
//!
//! # Responsibility
//! - Resolve database path, logging and retry settings from the environment.
//! - Keep defaults in one place for the FFI and CLI entry points.
//!
//! # Invariants
//! - `max_transition_attempts >= 1`.
//! - `from_env` rejects malformed values; `from_env_lenient` logs them and
//!   falls back to defaults.

use crate::logging::default_log_level;
use crate::repo::DEFAULT_MAX_TRANSITION_ATTEMPTS;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "HYDRATE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "HYDRATE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "HYDRATE_LOG_DIR";
pub const ENV_MAX_TRANSITION_ATTEMPTS: &str = "HYDRATE_MAX_TRANSITION_ATTEMPTS";
pub const ENV_NOTIFICATION_PAGE_LIMIT: &str = "HYDRATE_NOTIFICATION_PAGE_LIMIT";

const DEFAULT_DB_FILE_NAME: &str = "hydrate.sqlite3";
const DEFAULT_NOTIFICATION_PAGE_LIMIT: u32 = 20;

/// Resolved core settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// `None` leaves file logging off until the host calls `init_logging`.
    pub log_dir: Option<PathBuf>,
    pub max_transition_attempts: u32,
    pub notification_page_limit: u32,
}

/// A malformed environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value `{}`: {}", self.key, self.value, self.reason)
    }
}

impl Error for ConfigError {}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            max_transition_attempts: DEFAULT_MAX_TRANSITION_ATTEMPTS,
            notification_page_limit: DEFAULT_NOTIFICATION_PAGE_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from process environment, failing on bad values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration from process environment; bad values are logged
    /// and replaced by defaults.
    pub fn from_env_lenient() -> Self {
        let lookup = |key: &str| std::env::var(key).ok();
        let defaults = Self::default();
        Self {
            db_path: path_var(&lookup, ENV_DB_PATH).unwrap_or(defaults.db_path),
            log_level: text_var(&lookup, ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: path_var(&lookup, ENV_LOG_DIR),
            max_transition_attempts: positive_or_default(
                &lookup,
                ENV_MAX_TRANSITION_ATTEMPTS,
                defaults.max_transition_attempts,
            ),
            notification_page_limit: positive_or_default(
                &lookup,
                ENV_NOTIFICATION_PAGE_LIMIT,
                defaults.notification_page_limit,
            ),
        }
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            db_path: path_var(&lookup, ENV_DB_PATH).unwrap_or(defaults.db_path),
            log_level: text_var(&lookup, ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: path_var(&lookup, ENV_LOG_DIR),
            max_transition_attempts: positive_var(&lookup, ENV_MAX_TRANSITION_ATTEMPTS)?
                .unwrap_or(defaults.max_transition_attempts),
            notification_page_limit: positive_var(&lookup, ENV_NOTIFICATION_PAGE_LIMIT)?
                .unwrap_or(defaults.notification_page_limit),
        })
    }
}

fn text_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn path_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<PathBuf> {
    text_var(lookup, key).map(PathBuf::from)
}

fn positive_or_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u32,
) -> u32 {
    match positive_var(lookup, key) {
        Ok(value) => value.unwrap_or(default),
        Err(err) => {
            warn!(
                "event=config_load module=config status=fallback key={} reason={}",
                err.key, err.reason
            );
            default
        }
    }
}

fn positive_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let Some(value) = text_var(lookup, key) else {
        return Ok(None);
    };
    match value.parse::<u32>() {
        Ok(0) => Err(ConfigError {
            key,
            value,
            reason: "must be at least 1",
        }),
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError {
            key,
            value,
            reason: "not a positive integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CoreConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_MAX_TRANSITION_ATTEMPTS,
        ENV_NOTIFICATION_PAGE_LIMIT,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(config.max_transition_attempts >= 1);
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, " /data/hydrate.db "),
            (ENV_LOG_DIR, "/data/logs"),
            (ENV_MAX_TRANSITION_ATTEMPTS, "3"),
            (ENV_NOTIFICATION_PAGE_LIMIT, "50"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/hydrate.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/data/logs")));
        assert_eq!(config.max_transition_attempts, 3);
        assert_eq!(config.notification_page_limit, 50);
    }

    #[test]
    fn zero_or_garbage_attempts_are_rejected() {
        let err =
            CoreConfig::from_lookup(lookup_from(&[(ENV_MAX_TRANSITION_ATTEMPTS, "0")])).unwrap_err();
        assert_eq!(err.key, ENV_MAX_TRANSITION_ATTEMPTS);

        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_NOTIFICATION_PAGE_LIMIT, "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("many"));
    }
}
