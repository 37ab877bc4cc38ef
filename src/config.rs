//! Configuration loader for the `iot-monitor` backend service.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). By consolidating configuration logic
//! here, we avoid scattering `env::var` calls throughout the codebase.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
///
/// The target type bounds the accepted range, so e.g. an `HTTP_PORT` of
/// 65536 fails at startup instead of truncating later.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Port the HTTP server binds to.
    pub http_port: u16,

    /// Externally visible base URL, used to build navigation links.
    pub public_url: String,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `HTTP_PORT` – listen port (default: 8080)
/// - `PUBLIC_URL` – link base (default: `http://localhost:<HTTP_PORT>`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let http_port = parse_env!("HTTP_PORT", u16, 8080);
    let public_url = env::var("PUBLIC_URL")
        .unwrap_or_else(|_| format!("http://localhost:{http_port}"))
        .trim_end_matches('/')
        .to_string();

    Ok(Config {
        db_url,
        db_pool_max,
        http_port,
        public_url,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX  : {}", self.db_pool_max);
        tracing::info!("  HTTP_PORT    : {}", self.http_port);
        tracing::info!("  PUBLIC_URL   : {}", self.public_url);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    // Single test so the process-wide environment is only touched from one
    // place.
    #[test]
    fn port_is_validated_as_u16_at_load_time() {
        // ---
        env::set_var("DATABASE_URL", "postgres://user:pw@localhost/iot");
        env::remove_var("PUBLIC_URL");

        env::set_var("HTTP_PORT", "65536");
        assert!(load_from_env().is_err(), "out-of-range port must not load");

        env::set_var("HTTP_PORT", "8090");
        let cfg = load_from_env().expect("valid config");
        assert_eq!(cfg.http_port, 8090);
        assert_eq!(cfg.public_url, "http://localhost:8090");

        env::remove_var("HTTP_PORT");
    }
}
