//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Events between aggregate snapshots; 0 disables snapshots
    pub snapshot_interval: i64,

    /// Attempts per command before a concurrency conflict is surfaced
    pub command_max_attempts: u32,

    pub projector_poll_interval: Duration,

    pub projector_batch_size: i64,

    /// How long the projector waits on a hole in the global position sequence
    pub projector_gap_grace: Duration,

    /// `json` for machine-readable logs, anything else for the pretty format
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_var("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let snapshot_interval: i64 = parse_var("SNAPSHOT_INTERVAL", "50")?;
        if snapshot_interval < 0 {
            return Err(ConfigError::InvalidValue("SNAPSHOT_INTERVAL"));
        }

        let command_max_attempts: u32 = parse_var("COMMAND_MAX_ATTEMPTS", "3")?;
        if command_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("COMMAND_MAX_ATTEMPTS"));
        }

        let poll_ms: u64 = parse_var("PROJECTOR_POLL_INTERVAL_MS", "500")?;
        if poll_ms == 0 {
            return Err(ConfigError::InvalidValue("PROJECTOR_POLL_INTERVAL_MS"));
        }

        let projector_batch_size: i64 = parse_var("PROJECTOR_BATCH_SIZE", "256")?;
        if projector_batch_size <= 0 {
            return Err(ConfigError::InvalidValue("PROJECTOR_BATCH_SIZE"));
        }

        let gap_grace_ms: u64 = parse_var("PROJECTOR_GAP_GRACE_MS", "2000")?;

        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            snapshot_interval,
            command_max_attempts,
            projector_poll_interval: Duration::from_millis(poll_ms),
            projector_batch_size,
            projector_gap_grace: Duration::from_millis(gap_grace_ms),
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
