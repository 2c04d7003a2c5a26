//! Configuration for the feedback server
//!
//! Every setting comes from a `FEEDBACK_*` environment variable with a
//! compile-time default. Empty values count as unset. [`Config::from_lookup`]
//! takes the variable source as a closure so tests never touch the process
//! environment.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::storage::{StorageOptions, WriteAck};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MIN_CONNECTIONS: u32 = 0;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Minimum length of an explicitly configured session secret.
const MIN_SECRET_BYTES: usize = 32;

/// Size of the per-process secret generated in development.
const GENERATED_SECRET_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub storage: StorageOptions,
    /// `None` in development when no secret was configured.
    pub session_secret: Option<Vec<u8>>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let environment: Environment = parse_or(&get, "FEEDBACK_ENV", Environment::default())?;

        let url = get("FEEDBACK_DATABASE_URL")
            .ok_or(ConfigError::Missing("FEEDBACK_DATABASE_URL"))?;
        let min_connections =
            parse_or(&get, "FEEDBACK_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS)?;
        let max_connections =
            parse_or(&get, "FEEDBACK_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 || min_connections > max_connections {
            return Err(ConfigError::Invalid {
                name: "FEEDBACK_DB_MAX_CONNECTIONS",
                value: max_connections.to_string(),
                reason: format!(
                    "must be at least 1 and not below FEEDBACK_DB_MIN_CONNECTIONS ({})",
                    min_connections
                ),
            });
        }
        let connect_timeout =
            parse_or(&get, "FEEDBACK_DB_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        let busy_timeout =
            parse_or(&get, "FEEDBACK_DB_BUSY_TIMEOUT_SECS", DEFAULT_BUSY_TIMEOUT_SECS)?;
        let idle_timeout =
            parse_or(&get, "FEEDBACK_DB_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS)?;
        let write_ack: WriteAck = parse_or(&get, "FEEDBACK_DB_SYNCHRONOUS", WriteAck::Normal)?;

        let storage = StorageOptions {
            min_connections,
            max_connections,
            connect_timeout: Duration::from_secs(connect_timeout),
            busy_timeout: Duration::from_secs(busy_timeout),
            // Zero disables idle reaping
            idle_timeout: (idle_timeout > 0).then(|| Duration::from_secs(idle_timeout)),
            write_ack,
            ..StorageOptions::new(url)
        };

        let session_secret = match get("FEEDBACK_SESSION_SECRET") {
            Some(secret) if environment.is_production() && secret.len() < MIN_SECRET_BYTES => {
                return Err(ConfigError::Invalid {
                    name: "FEEDBACK_SESSION_SECRET",
                    value: "<redacted>".to_string(),
                    reason: format!("must be at least {} bytes in production", MIN_SECRET_BYTES),
                });
            }
            Some(secret) => Some(secret.into_bytes()),
            None if environment.is_production() => {
                return Err(ConfigError::Missing("FEEDBACK_SESSION_SECRET"));
            }
            None => None,
        };

        Ok(Self {
            host: get("FEEDBACK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "FEEDBACK_PORT", DEFAULT_PORT)?,
            environment,
            storage,
            session_secret,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured session secret, or a fresh random one. Sessions signed
    /// with a generated secret do not survive a restart.
    pub fn session_secret_or_random(&self) -> Vec<u8> {
        if let Some(secret) = &self.session_secret {
            return secret.clone();
        }
        tracing::warn!("FEEDBACK_SESSION_SECRET not set, using a random per-process secret");
        let mut secret = vec![0u8; GENERATED_SECRET_BYTES];
        OsRng.fill_bytes(&mut secret);
        secret
    }
}

fn parse_or<G, T>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match get(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Directory for rolling log files, if file logging is enabled.
///
/// Read directly from the environment because logging starts before the
/// rest of the configuration is loaded.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var("FEEDBACK_LOG_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("FEEDBACK_DATABASE_URL", "sqlite://feedback.db")]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.storage.url, "sqlite://feedback.db");
        assert_eq!(config.storage.max_connections, 5);
        assert_eq!(config.storage.min_connections, 0);
        assert_eq!(config.storage.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.storage.busy_timeout, Duration::from_secs(30));
        assert_eq!(config.storage.idle_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.storage.write_ack, WriteAck::Normal);
        assert!(config.session_secret.is_none());
    }

    #[test]
    fn test_database_url_required() {
        assert!(matches!(
            config_from(&[]),
            Err(ConfigError::Missing("FEEDBACK_DATABASE_URL"))
        ));
        assert!(matches!(
            config_from(&[("FEEDBACK_DATABASE_URL", "  ")]),
            Err(ConfigError::Missing("FEEDBACK_DATABASE_URL"))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_HOST", "127.0.0.1"),
            ("FEEDBACK_PORT", "8080"),
            ("FEEDBACK_DB_MAX_CONNECTIONS", "12"),
            ("FEEDBACK_DB_MIN_CONNECTIONS", "2"),
            ("FEEDBACK_DB_IDLE_TIMEOUT_SECS", "0"),
            ("FEEDBACK_DB_SYNCHRONOUS", "full"),
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.storage.max_connections, 12);
        assert_eq!(config.storage.min_connections, 2);
        assert_eq!(config.storage.idle_timeout, None);
        assert_eq!(config.storage.write_ack, WriteAck::Full);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "FEEDBACK_PORT", .. }));

        let err = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_DB_MIN_CONNECTIONS", "6"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "FEEDBACK_DB_MAX_CONNECTIONS", .. }
        ));
    }

    #[test]
    fn test_production_requires_secret() {
        let err = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_ENV", "production"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("FEEDBACK_SESSION_SECRET")));

        let err = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_ENV", "production"),
            ("FEEDBACK_SESSION_SECRET", "short"),
        ])
        .unwrap_err();
        assert!(!err.to_string().contains("short"));

        let secret = "x".repeat(MIN_SECRET_BYTES);
        let config = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_ENV", "PROD"),
            ("FEEDBACK_SESSION_SECRET", secret.as_str()),
        ])
        .unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.session_secret_or_random(), secret.into_bytes());
    }

    #[test]
    fn test_generated_secret_is_random() {
        let config = config_from(&[("FEEDBACK_DATABASE_URL", "sqlite::memory:")]).unwrap();
        let a = config.session_secret_or_random();
        let b = config.session_secret_or_random();
        assert_eq!(a.len(), GENERATED_SECRET_BYTES);
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let err = config_from(&[
            ("FEEDBACK_DATABASE_URL", "sqlite::memory:"),
            ("FEEDBACK_ENV", "staging"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "FEEDBACK_ENV", .. }));
    }
}
