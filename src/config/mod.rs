//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.
//! Engine tuning lives in an optional TOML file, see [`settings`].

pub mod secrets;
pub mod settings;

use crate::db::pgmq::DEFAULT_NOTIFY_QUEUE;
use crate::error::{Error, Result};
use secrecy::SecretString;

pub use self::settings::Settings;

const DEFAULT_MAX_CONNECTIONS: u32 = 20;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Optional schema set as `search_path` on every connection.
    pub db_schema: Option<String>,
    pub db_max_connections: u32,
    pub notify_queue: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let db_max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("DB_MAX_CONNECTIONS must be a positive integer, got {raw:?}"))
            })?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            db_schema: optional_var("DB_SCHEMA"),
            db_max_connections,
            notify_queue: optional_var("NOTIFY_QUEUE")
                .unwrap_or_else(|| DEFAULT_NOTIFY_QUEUE.to_string()),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and empty are treated alike.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
