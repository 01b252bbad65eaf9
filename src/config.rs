use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docflow client.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the ingestion API consumed by the upload pipeline.
    pub ingest_api_url: String,
    /// Optional override for the status polling cadence, in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Optional ceiling on status poll attempts per job.
    pub poll_max_attempts: Option<u32>,
    /// Optional content type sent with raw document transfers.
    pub upload_content_type: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ingest_api_url: load_env("INGEST_API_URL")?,
            poll_interval_ms: load_env_optional("DOCFLOW_POLL_INTERVAL_MS")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("DOCFLOW_POLL_INTERVAL_MS".to_string())
                    })
                })
                .transpose()?,
            poll_max_attempts: load_env_optional("DOCFLOW_POLL_MAX_ATTEMPTS")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("DOCFLOW_POLL_MAX_ATTEMPTS".to_string())
                    })
                })
                .transpose()?,
            upload_content_type: load_env_optional("DOCFLOW_CONTENT_TYPE"),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        ingest_api_url = %config.ingest_api_url,
        poll_interval_ms = ?config.poll_interval_ms,
        poll_max_attempts = ?config.poll_max_attempts,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
