//! Configuration management

use std::str::FromStr;

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_AVG_SPEED_KMH, DEFAULT_OFFLOAD_THRESHOLD, DEFAULT_SERVICE_TIME_MINUTES};
use crate::services::eta::EtaParams;

/// Which store implementation backs the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("unknown STORE_BACKEND '{other}' (expected postgres or memory)"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    pub store_backend: StoreBackend,

    /// PostgreSQL connection string, required for the postgres backend
    pub database_url: Option<String>,

    /// Default ETA parameters when a request does not override them
    pub eta: EtaParams,

    /// Candidate count above which the optimizer runs on the blocking pool
    pub offload_threshold: usize,
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{raw}'")),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nats_url = lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let store_backend = match lookup("STORE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let eta = EtaParams {
            avg_speed_kmh: parse_or(lookup("AVG_SPEED_KMH"), "AVG_SPEED_KMH", DEFAULT_AVG_SPEED_KMH)?,
            service_time_minutes: parse_or(
                lookup("SERVICE_TIME_MINUTES"),
                "SERVICE_TIME_MINUTES",
                DEFAULT_SERVICE_TIME_MINUTES,
            )?,
        };
        eta.validate().context("invalid ETA configuration")?;

        let offload_threshold =
            parse_or(lookup("OFFLOAD_THRESHOLD"), "OFFLOAD_THRESHOLD", DEFAULT_OFFLOAD_THRESHOLD)?;

        Ok(Self {
            nats_url,
            store_backend,
            database_url,
            eta,
            offload_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_config_defaults_with_database_url() {
        let config = config_from(&[("DATABASE_URL", "postgres://test")]).unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.eta.avg_speed_kmh, 40.0);
        assert_eq!(config.eta.service_time_minutes, 10.0);
        assert_eq!(config.offload_threshold, 200);
    }

    #[test]
    fn test_config_postgres_requires_database_url() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn test_config_memory_backend_needs_no_database() {
        let config = config_from(&[("STORE_BACKEND", "Memory")]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("AVG_SPEED_KMH", "fast")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("AVG_SPEED_KMH", "0")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("OFFLOAD_THRESHOLD", "-1")]).is_err());
    }

    #[test]
    fn test_config_unknown_backend() {
        assert!(config_from(&[("STORE_BACKEND", "sqlite")]).is_err());
    }
}
