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

/// Runtime configuration for the Labtract service.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the OCR provider.
    pub ocr_url: String,
    /// Optional API key required by the OCR provider.
    pub ocr_api_key: Option<String>,
    /// Base URL of the LLM provider.
    pub llm_url: String,
    /// Model identifier passed to the LLM provider on every invocation.
    pub llm_model: String,
    /// Base URL of the blob store used for staging and artifacts.
    pub storage_url: String,
    /// Bucket that holds documents staged for asynchronous OCR jobs.
    pub staging_bucket: String,
    /// Bucket that receives extracted-text, CSV, and raw-response artifacts.
    pub artifact_bucket: String,
    /// Optional override for the chunk character budget (defaults to 6000).
    pub max_chunk_chars: Option<usize>,
    /// Seconds between OCR job status probes (defaults to 5).
    pub ocr_poll_interval_secs: Option<u64>,
    /// Optional ceiling on the total OCR poll duration; unset waits forever.
    pub ocr_poll_deadline_secs: Option<u64>,
    /// Connect/read timeout applied to provider HTTP clients (defaults to 300).
    pub provider_timeout_secs: Option<u64>,
    /// Attempts per provider request for transient transport errors (defaults to 3).
    pub provider_retry_attempts: Option<u32>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Character budget used by the chunker when no override is configured.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 6000;
/// Seconds slept between OCR job status probes by default.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default connect/read timeout for provider HTTP clients, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 300;
/// Default attempt count for transient transport errors.
pub const DEFAULT_PROVIDER_RETRY_ATTEMPTS: u32 = 3;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ocr_url: load_env("OCR_URL")?,
            ocr_api_key: load_env_optional("OCR_API_KEY"),
            llm_url: load_env("LLM_URL")?,
            llm_model: load_env("LLM_MODEL")?,
            storage_url: load_env("STORAGE_URL")?,
            staging_bucket: load_env("STAGING_BUCKET")?,
            artifact_bucket: load_env("ARTIFACT_BUCKET")?,
            max_chunk_chars: parse_optional("MAX_CHUNK_CHARS")?,
            ocr_poll_interval_secs: parse_optional("OCR_POLL_INTERVAL_SECS")?,
            ocr_poll_deadline_secs: parse_optional("OCR_POLL_DEADLINE_SECS")?,
            provider_timeout_secs: parse_optional("PROVIDER_TIMEOUT_SECS")?,
            provider_retry_attempts: parse_optional("PROVIDER_RETRY_ATTEMPTS")?,
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Effective chunk character budget, clamped to at least one character.
    pub fn chunk_budget(&self) -> usize {
        self.max_chunk_chars
            .unwrap_or(DEFAULT_MAX_CHUNK_CHARS)
            .max(1)
    }

    /// Effective interval between OCR status probes.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.ocr_poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    /// Optional ceiling on how long an OCR job may be polled before timing out.
    pub fn poll_deadline(&self) -> Option<std::time::Duration> {
        self.ocr_poll_deadline_secs
            .map(std::time::Duration::from_secs)
    }

    /// Connect/read timeout shared by the provider HTTP clients.
    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.provider_timeout_secs
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
        )
    }

    /// Attempts made per provider request before a transport error is surfaced.
    pub fn retry_attempts(&self) -> u32 {
        self.provider_retry_attempts
            .unwrap_or(DEFAULT_PROVIDER_RETRY_ATTEMPTS)
            .max(1)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
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
        ocr_url = %config.ocr_url,
        llm_url = %config.llm_url,
        model = %config.llm_model,
        storage_url = %config.storage_url,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
