//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. Sensitive values wrapped in secrecy::SecretString to prevent
//! log leaks.

pub mod secrets;

use std::time::Duration;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Default time between assignment ticks.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Default email of the system actor row.
pub const DEFAULT_SYSTEM_USER_EMAIL: &str = "System";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub autoassign_interval: Duration,
    pub system_user_email: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            autoassign_interval: interval_var("AUTOASSIGN_INTERVAL_SECS")?,
            system_user_email: std::env::var("SYSTEM_USER_EMAIL")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_USER_EMAIL.to_string()),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn interval_var(name: &str) -> Result<Duration> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(Duration::from_secs(DEFAULT_INTERVAL_SECS));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{name} must be greater than zero"))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(Error::Config(format!("{name}={raw:?} is not a number of seconds: {e}"))),
    }
}
