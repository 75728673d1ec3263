//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Directory for the local snapshot store.
    pub data_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub interpreter_model: String,
    pub image_model: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_success_url: String,
    pub stripe_cancel_url: String,
    pub toss_secret_key: Option<String>,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").ok();
        let toss_secret_key = std::env::var("TOSS_SECRET_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let interpreter_model =
            std::env::var("INTERPRETER_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let image_model =
            std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string());
        let stripe_success_url = std::env::var("STRIPE_SUCCESS_URL")
            .unwrap_or_else(|_| "http://localhost:3000/purchase/success".to_string());
        let stripe_cancel_url = std::env::var("STRIPE_CANCEL_URL")
            .unwrap_or_else(|_| "http://localhost:3000/purchase/cancel".to_string());
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            data_dir,
            openai_api_key,
            interpreter_model,
            image_model,
            stripe_secret_key,
            stripe_success_url,
            stripe_cancel_url,
            toss_secret_key,
            cors_origin,
        })
    }
}
