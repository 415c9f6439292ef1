//! Application configuration.
//!
//! Everything is read from environment variables (optionally via a `.env`
//! file) once at startup and handed to the rest of the service as a single
//! [`Config`] value.

use interview_core::engine::EngineSettings;
use interview_core::openai::DEFAULT_BASE_URL;
use interview_core::retrieval::DEFAULT_EMBEDDING_DIMENSION;
use interview_core::session_memory::{DEFAULT_IDLE_TTL, DEFAULT_MAX_TURNS};
use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: SecretString,
    pub index_host: String,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub pinecone: Option<PineconeConfig>,
    pub engine: EngineSettings,
    pub session_idle_ttl: Duration,
    pub session_max_turns: usize,
    pub dedup_ttl: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `OPENAI_API_KEY`: Required.
    /// *   `OPENAI_BASE_URL`: Defaults to the public OpenAI endpoint.
    /// *   `CHAT_MODEL`: Defaults to "gpt-4o-mini".
    /// *   `EMBEDDING_MODEL`: Defaults to "text-embedding-3-small".
    /// *   `EMBEDDING_DIMENSION`: Dimension of the Pinecone index. Defaults to 1024.
    /// *   `PINECONE_API_KEY` / `PINECONE_INDEX_HOST`: Set both to enable context retrieval.
    /// *   `MAX_QUESTIONS_PER_TOPIC`: Defaults to 2.
    /// *   `MAX_GENERATION_ATTEMPTS`: Defaults to 3.
    /// *   `CALL_TIMEOUT_SECS`: Timeout for every external call. Defaults to 30.
    /// *   `SESSION_IDLE_TTL_SECS`: Defaults to 1800.
    /// *   `SESSION_MAX_TURNS`: Defaults to 20.
    /// *   `DEDUP_TTL_SECS`: Defaults to 86400.
    /// *   `RUST_LOG`: Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = var("OPENAI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let openai_base_url = var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let embedding_model =
            var("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string());
        let embedding_dimension =
            parse_or(&var, "EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?;

        let pinecone = match (var("PINECONE_API_KEY"), var("PINECONE_INDEX_HOST")) {
            (Some(api_key), Some(index_host)) => Some(PineconeConfig {
                api_key: SecretString::from(api_key),
                index_host,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingVar(
                    "PINECONE_INDEX_HOST must be set when PINECONE_API_KEY is".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingVar(
                    "PINECONE_API_KEY must be set when PINECONE_INDEX_HOST is".to_string(),
                ));
            }
        };

        let defaults = EngineSettings::default();
        let engine = EngineSettings {
            max_questions_per_topic: positive(
                &var,
                "MAX_QUESTIONS_PER_TOPIC",
                defaults.max_questions_per_topic,
            )?,
            max_generation_attempts: positive(
                &var,
                "MAX_GENERATION_ATTEMPTS",
                defaults.max_generation_attempts,
            )?,
            call_timeout: Duration::from_secs(positive(
                &var,
                "CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )?),
        };

        let session_idle_ttl = Duration::from_secs(parse_or(
            &var,
            "SESSION_IDLE_TTL_SECS",
            DEFAULT_IDLE_TTL.as_secs(),
        )?);
        let session_max_turns = positive(&var, "SESSION_MAX_TURNS", DEFAULT_MAX_TURNS)?;
        let dedup_ttl = Duration::from_secs(positive(&var, "DEDUP_TTL_SECS", 24 * 60 * 60)?);

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            openai_api_key,
            openai_base_url,
            chat_model,
            embedding_model,
            embedding_dimension,
            pinecone,
            engine,
            session_idle_ttl,
            session_max_turns,
            dedup_ttl,
            log_level,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn positive<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_or(var, key, default)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}
