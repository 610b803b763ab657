//! Application configuration loaded from environment variables.

use domain::RetryConfig;
use ledger::DEFAULT_MAX_PURCHASE_QUANTITY;
use thiserror::Error;

/// A configuration variable that is set but cannot be used.
#[derive(Debug, Error)]
#[error("Invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `COMMIT_MAX_ATTEMPTS`, `COMMIT_BASE_DELAY_MS`, `COMMIT_MAX_DELAY_MS`:
///   retry policy for optimistic commits (defaults: 8, 5, 200)
/// - `MAX_PURCHASE_QUANTITY`: per-request cap (default: `2000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub retry: RetryConfig,
    pub max_purchase_quantity: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let retry = RetryConfig {
            max_attempts: parse(&lookup, "COMMIT_MAX_ATTEMPTS")?
                .unwrap_or(defaults.retry.max_attempts)
                .max(1),
            base_delay_ms: parse(&lookup, "COMMIT_BASE_DELAY_MS")?
                .unwrap_or(defaults.retry.base_delay_ms),
            max_delay_ms: parse(&lookup, "COMMIT_MAX_DELAY_MS")?
                .unwrap_or(defaults.retry.max_delay_ms),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None => defaults.log_format,
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(value) if value.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(value) => {
                return Err(ConfigError {
                    name: "LOG_FORMAT",
                    value: value.to_string(),
                });
            }
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            retry,
            max_purchase_quantity: parse(&lookup, "MAX_PURCHASE_QUANTITY")?
                .unwrap_or(defaults.max_purchase_quantity),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { name, value }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            retry: RetryConfig::default(),
            max_purchase_quantity: DEFAULT_MAX_PURCHASE_QUANTITY,
        }
    }
}
