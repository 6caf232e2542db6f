//! Environment-based server configuration

use std::time::Duration;

use ecp_common::{EcpError, Result};

use crate::db::DbConfig;
use crate::ingest::fetcher::RetryConfig;

/// Default dataset landing page on the open-data portal.
pub const DEFAULT_DATASET_URL: &str =
    "https://data.gov.lt/datasets/1975/";

/// Full server configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Pipeline settings: where to find the dataset and how patiently to fetch.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Landing page listing the monthly CSV files.
    pub dataset_url: String,
    /// HTTP client timeout; generous because monthly extracts are large.
    pub http_timeout: Duration,
    pub retry: RetryConfig,
    /// Lower bound for accepted processing years.
    pub min_year: i32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            http_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
            min_year: ecp_common::types::DEFAULT_MIN_YEAR,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for everything except `DATABASE_URL`.
    pub fn load() -> Result<Self> {
        let server = ServerConfig {
            host: env_or("ECP_HOST", "0.0.0.0"),
            port: env_parse_or("ECP_PORT", 8080)?,
        };

        let database = DbConfig::from_env()
            .map_err(|e| EcpError::Config(e.to_string()))?;

        let defaults = IngestConfig::default();
        let ingest = IngestConfig {
            dataset_url: env_or("ECP_DATASET_URL", DEFAULT_DATASET_URL),
            http_timeout: Duration::from_secs(env_parse_or(
                "ECP_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            retry: RetryConfig {
                max_attempts: env_parse_or("ECP_FETCH_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                max_delay: Duration::from_secs(env_parse_or(
                    "ECP_FETCH_MAX_BACKOFF_SECS",
                    defaults.retry.max_delay.as_secs(),
                )?),
                base_delay: defaults.retry.base_delay,
            },
            min_year: env_parse_or("ECP_MIN_YEAR", defaults.min_year)?,
        };

        Ok(Self {
            server,
            database,
            ingest,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| EcpError::Config(format!("invalid value for {}: {}", key, value))),
        Err(_) => Ok(default),
    }
}
