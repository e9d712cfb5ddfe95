//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chat_demo_core::{ReplyConfig, SessionConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_COUNTRIES_URL: &str =
    "https://restcountries.com/v3.1/all?fields=name,idd,flag,cca2";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub data_dir: PathBuf,
    pub countries_url: String,
    pub allowed_origin: String,
    pub session: SessionConfig,
    pub replies: ReplyConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = PathBuf::from(var_or("DATA_DIR", "./data"));
        let countries_url = var_or("COUNTRIES_URL", DEFAULT_COUNTRIES_URL);
        let allowed_origin = var_or("ALLOWED_ORIGIN", "http://localhost:3000");

        // --- Simulated Latencies ---
        let millis = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(Duration::from_millis(default)),
                Some(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|e| {
                    ConfigError::InvalidValue(key.to_string(), format!("'{}': {}", raw, e))
                }),
            }
        };

        let session = SessionConfig {
            send_code_delay: millis("SEND_CODE_DELAY_MS", 2000)?,
            login_delay: millis("LOGIN_DELAY_MS", 1500)?,
        };
        let replies = ReplyConfig {
            min_delay: millis("REPLY_MIN_DELAY_MS", 1000)?,
            max_delay: millis("REPLY_MAX_DELAY_MS", 3000)?,
        };
        if replies.min_delay > replies.max_delay {
            return Err(ConfigError::InvalidValue(
                "REPLY_MIN_DELAY_MS".to_string(),
                "must not exceed REPLY_MAX_DELAY_MS".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            data_dir,
            countries_url,
            allowed_origin,
            session,
            replies,
        })
    }
}
