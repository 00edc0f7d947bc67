//! Application Configuration Module
//!
//! Loads the settings of the interview room client from environment
//! variables (and a `.env` file when present).

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// Capacity of the channels between the socket, the room and the terminal.
pub const EVENT_CAPACITY: usize = 1024;
/// Timestamps are shown in the product's home timezone.
pub const DISPLAY_UTC_OFFSET_HOURS: i32 = 7;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_GREETING_DELAY_MS: u64 = 5000;

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub api_url: String,
    pub token: SecretString,
    pub greeting_delay: Duration,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid number provided for {0}: {1}")]
    InvalidNumber(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `INTERVIEW_TOKEN`: The bearer token of the signed-in user. Required.
    // *   `INTERVIEW_API_URL`: (Optional) Base URL of the backend. Defaults to "http://localhost:5000".
    // *   `GREETING_DELAY_MS`: (Optional) Delay before the opening greeting. Defaults to 5000.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("INTERVIEW_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("INTERVIEW_TOKEN".to_string()))?;

        let api_url = lookup("INTERVIEW_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let greeting_delay = match lookup("GREETING_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber("GREETING_DELAY_MS".to_string(), raw))?,
            None => DEFAULT_GREETING_DELAY_MS,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_url,
            token: SecretString::from(token),
            greeting_delay: Duration::from_millis(greeting_delay),
            log_level,
        })
    }

    /// Settings for the realtime socket, sharing the URL and the token.
    pub fn realtime_config(&self) -> interview_realtime::Config {
        interview_realtime::Config::builder()
            .with_api_url(&self.api_url)
            .with_token(self.token.expose_secret())
            .build()
    }
}
