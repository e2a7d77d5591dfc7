//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The resulting `Config` is built once
//! and shared through `AppState`; nothing reads the environment afterwards.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// Signing secret used when `JWT_SECRET` is unset. Only suitable for local development.
pub const DEV_JWT_SECRET: &str = "default_secret";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub jwt_secret: String,
    /// `true` when `jwt_secret` fell back to `DEV_JWT_SECRET`.
    pub jwt_secret_is_default: bool,
    pub jwt_issuer: String,
    pub db_max_connections: u32,
    /// How long order placement waits for a book's row lock.
    pub lock_timeout: Duration,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)?;
        let lock_timeout_ms: u64 = parse_or("LOCK_TIMEOUT_MS", lookup("LOCK_TIMEOUT_MS"), 5_000)?;
        if lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "LOCK_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Token Settings ---
        let (jwt_secret, jwt_secret_is_default) = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => (secret, false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        };
        let jwt_issuer = lookup("JWT_ISSUER").unwrap_or_else(|| "bookstore".to_string());

        let cors_origin = lookup("CORS_ORIGIN").filter(|origin| !origin.is_empty());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            jwt_secret_is_default,
            jwt_issuer,
            db_max_connections,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            cors_origin,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), format!("'{}' is not a number", value))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/bookstore")]).unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(config.jwt_secret_is_default);
        assert_eq!(config.jwt_issuer, "bookstore");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn explicit_secret_is_not_flagged_as_default() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "s3cret"),
            ("LOCK_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(!config.jwt_secret_is_default);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(ref v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let base = ("DATABASE_URL", "postgres://db");
        assert!(load(&[base, ("BIND_ADDRESS", "nope")]).is_err());
        assert!(load(&[base, ("RUST_LOG", "chatty")]).is_err());
        assert!(load(&[base, ("LOCK_TIMEOUT_MS", "0")]).is_err());
        assert!(load(&[base, ("DB_MAX_CONNECTIONS", "many")]).is_err());
    }
}
