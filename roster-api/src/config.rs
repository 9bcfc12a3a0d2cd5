/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (or `DATABASE_URI`): PostgreSQL connection string (required)
/// - `HOST`: Host to bind to (default: 0.0.0.0)
/// - `PORT`: Port to bind to (default: 3000)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DB_RETRY_INTERVAL_SECS`: Delay between connection attempts (default: 5)
/// - `DB_MAX_RETRIES`: Give up after this many attempts (default: never)
/// - `RUST_LOG`: Log filter
///
/// A `config/.env` file and then a `.env` file are loaded first when present.
///
/// # Example
///
/// ```no_run
/// use roster_api::config::Config;
///
/// # fn example() -> Result<(), roster_api::config::ConfigError> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use roster_shared::db::{client::RetryPolicy, pool::DatabaseConfig};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("{name} has invalid value {value:?}")]
    Invalid {
        /// Variable name
        name: &'static str,

        /// Offending value
        value: String,
    },
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database pool configuration
    pub database: DatabaseConfig,

    /// Startup connection retry policy
    pub retry: RetryPolicy,
}

/// API server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is missing or blank, or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env files if present (for development)
        dotenvy::from_path("config/.env").ok();
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let url = get("DATABASE_URL")
            .or_else(|| get("DATABASE_URI"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse(&get, "PORT")?.unwrap_or(3000);

        let defaults = DatabaseConfig::default();
        let max_connections =
            parse(&get, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections);

        let retry_defaults = RetryPolicy::default();
        let interval = parse(&get, "DB_RETRY_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(retry_defaults.interval);
        let max_attempts = parse(&get, "DB_MAX_RETRIES")?;

        Ok(Self {
            api: ApiConfig { host, port },
            database: DatabaseConfig {
                url: url.trim().to_string(),
                max_connections,
                ..defaults
            },
            retry: RetryPolicy {
                interval,
                max_attempts,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse<T, G>(get: &G, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
