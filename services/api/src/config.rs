//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
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
    pub database_max_connections: u32,
    pub log_level: Level,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub google_client_ids: Vec<String>,
    pub apple_client_ids: Vec<String>,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub tts_voice: String,
    pub file_storage_path: PathBuf,
    pub public_files_base: String,
    pub cors_origin: String,
    pub cleanup_interval: Duration,
    pub short_conversation_grace: Duration,
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

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = required("DATABASE_URL")?;
        let database_max_connections =
            parse_var("DATABASE_MAX_CONNECTIONS", &var_or("DATABASE_MAX_CONNECTIONS", "5"))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Auth Settings ---
        let jwt_secret = required("JWT_SECRET")?;
        let access_token_ttl = Duration::from_secs(parse_var(
            "ACCESS_TOKEN_TTL_SECS",
            &var_or("ACCESS_TOKEN_TTL_SECS", "900"),
        )?);
        let refresh_token_ttl = chrono::Duration::days(parse_var(
            "REFRESH_TOKEN_TTL_DAYS",
            &var_or("REFRESH_TOKEN_TTL_DAYS", "30"),
        )?);
        let google_client_ids = split_list(&var_or("GOOGLE_CLIENT_IDS", ""));
        let apple_client_ids = split_list(&var_or("APPLE_CLIENT_IDS", ""));

        // --- Load API Keys (as optional) ---
        let openai_api_key = lookup("OPENAI_API_KEY");

        // --- Load Adapter-specific Settings ---
        let chat_model = var_or("CHAT_MODEL", "gpt-4o-mini");
        let tts_voice = var_or("TTS_VOICE", "alloy");
        let file_storage_path = PathBuf::from(var_or("FILE_STORAGE_PATH", "./storage"));
        let public_files_base = var_or("PUBLIC_FILES_BASE", "/files")
            .trim_end_matches('/')
            .to_string();
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Load Background Task Settings ---
        let cleanup_interval = Duration::from_secs(parse_var(
            "CLEANUP_INTERVAL_SECS",
            &var_or("CLEANUP_INTERVAL_SECS", "3600"),
        )?);
        let short_conversation_grace = Duration::from_secs(parse_var(
            "SHORT_CONVERSATION_GRACE_SECS",
            &var_or("SHORT_CONVERSATION_GRACE_SECS", "3600"),
        )?);

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            google_client_ids,
            apple_client_ids,
            openai_api_key,
            chat_model,
            tts_voice,
            file_storage_path,
            public_files_base,
            cors_origin,
            cleanup_interval,
            short_conversation_grace,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
