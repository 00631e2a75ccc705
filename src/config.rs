//! Process configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured if present.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::database::Database;
use crate::error::ConfigError;
use crate::hub::{HubConfig, DEFAULT_WRITE_TIMEOUT};
use crate::server::DEFAULT_PORT;

/// Where journeys are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database: DatabaseLocation,
    pub write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            database: DatabaseLocation::File(Database::default_path()),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!(path = ?path, "Loaded .env file"),
            Err(_) => tracing::info!("No .env file found"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    ///
    /// Recognised keys: `TRANSIT_HOST`, `PORT`, `TRANSIT_DB_PATH`
    /// (`:memory:` for an ephemeral store) and `TRANSIT_WRITE_TIMEOUT_MS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = match lookup("TRANSIT_HOST") {
            Some(raw) => parse("TRANSIT_HOST", &raw, |v| v.parse::<IpAddr>())?,
            None => defaults.bind_addr.ip(),
        };
        let port = match lookup("PORT") {
            Some(raw) => parse("PORT", &raw, |v| v.parse::<u16>())?,
            None => defaults.bind_addr.port(),
        };

        let database = match lookup("TRANSIT_DB_PATH") {
            Some(raw) if raw.trim() == ":memory:" => DatabaseLocation::Memory,
            Some(raw) if !raw.trim().is_empty() => DatabaseLocation::File(PathBuf::from(raw.trim())),
            _ => defaults.database,
        };

        let write_timeout = match lookup("TRANSIT_WRITE_TIMEOUT_MS") {
            Some(raw) => {
                let ms = parse("TRANSIT_WRITE_TIMEOUT_MS", &raw, |v| v.parse::<u64>())?;
                if ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "TRANSIT_WRITE_TIMEOUT_MS",
                        value: raw,
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => defaults.write_timeout,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            database,
            write_timeout,
        })
    }

    pub fn hub(&self) -> HubConfig {
        HubConfig {
            write_timeout: self.write_timeout,
        }
    }
}

fn parse<T, E: std::fmt::Display>(
    key: &'static str,
    raw: &str,
    f: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    f(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert!(matches!(config.database, DatabaseLocation::File(_)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TRANSIT_HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("TRANSIT_DB_PATH", ":memory:"),
            ("TRANSIT_WRITE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database, DatabaseLocation::Memory);
        assert_eq!(config.hub().write_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_db_path() {
        let config = Config::from_lookup(lookup(&[("TRANSIT_DB_PATH", "/tmp/t.db")])).unwrap();
        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/tmp/t.db"))
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_lookup(lookup(&[("TRANSIT_WRITE_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "TRANSIT_WRITE_TIMEOUT_MS",
                ..
            }
        ));
    }
}
