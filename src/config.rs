//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Service configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Port for the HTTP/WebSocket server.
    pub port: u16,
    /// Path to the libsql session database.
    pub db_path: PathBuf,
    /// Anthropic model id for the conversational agent.
    pub model: String,
    /// API key for the LLM provider.
    pub api_key: SecretString,
    /// Interval for the periodic backstop session save.
    pub save_interval: Duration,
    /// Maximum persistence retry attempts before a save is dropped.
    pub save_max_retries: u32,
}

impl ServiceConfig {
    /// Read configuration from `INTAKE_*` environment variables.
    ///
    /// `ANTHROPIC_API_KEY` is the only required variable; everything else
    /// has a default suitable for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".into()))?;

        let port = parse_env("INTAKE_PORT", 8080u16)?;
        let save_interval_secs = parse_env("INTAKE_SAVE_INTERVAL_SECS", 30u64)?;
        let save_max_retries = parse_env("INTAKE_SAVE_MAX_RETRIES", 3u32)?;

        let db_path = std::env::var("INTAKE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/intake-assist.db"));

        let model = std::env::var("INTAKE_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        Ok(Self {
            port,
            db_path,
            model,
            api_key: SecretString::from(api_key),
            save_interval: Duration::from_secs(save_interval_secs),
            save_max_retries,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_to_default() {
        let port: u16 = parse_env("INTAKE_TEST_UNSET_VAR", 9999).unwrap();
        assert_eq!(port, 9999);
    }
}
