//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// Origins of the development frontends allowed by default.
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3001",
    "http://172.29.208.1:3000",
];

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for verifying tokens issued by the external identity provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub jwks_url: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub cache_ttl_secs: u64,
    /// Minimum spacing between forced key-set refetches.
    pub min_refresh_secs: u64,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub insight_model: String,
    pub insight_temperature: f32,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub provider: Option<ProviderConfig>,
    pub cors_allowed_origins: Vec<String>,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

/// Splits a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    // Credentialed CORS cannot use a wildcard origin.
    if origins.iter().any(|origin| origin == "*") {
        return Err(ConfigError::InvalidValue(
            "CORS_ALLOWED_ORIGINS".to_string(),
            "wildcard origin is not allowed with credentials; list origins explicitly".to_string(),
        ));
    }
    Ok(origins)
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
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required_var("DATABASE_URL")?;
        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load the LLM Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let insight_model =
            std::env::var("INSIGHT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let insight_temperature = parse_var("INSIGHT_TEMPERATURE", 0.4f32)?;

        // --- Load Authentication Settings ---
        let secret_key = required_var("SECRET_KEY")?;
        let access_token_expire_minutes = parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", 30i64)?;
        if access_token_expire_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "ACCESS_TOKEN_EXPIRE_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }

        let provider = match std::env::var("CLERK_JWKS_URL") {
            Ok(jwks_url) if !jwks_url.trim().is_empty() => Some(ProviderConfig {
                jwks_url,
                issuer: std::env::var("CLERK_ISSUER").ok(),
                audience: std::env::var("CLERK_AUDIENCE").ok(),
                cache_ttl_secs: parse_var("JWKS_CACHE_TTL_SECS", 3600u64)?,
                min_refresh_secs: parse_var("JWKS_MIN_REFRESH_SECS", 30u64)?,
            }),
            _ => None,
        };

        let cors_allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
            Ok(raw) => parse_origins(&raw)?,
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            openai_api_key,
            insight_model,
            insight_temperature,
            secret_key,
            access_token_expire_minutes,
            provider,
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blanks_dropped() {
        assert_eq!(
            parse_origins(" http://a.test , ,http://b.test,").unwrap(),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn wildcard_origin_is_rejected() {
        assert!(matches!(
            parse_origins("http://a.test, *"),
            Err(ConfigError::InvalidValue(name, _)) if name == "CORS_ALLOWED_ORIGINS"
        ));
    }
}
