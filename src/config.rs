use crate::constants::*;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("SESSION_SECRET must be set")]
    MissingSessionSecret,

    #[error("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LENGTH} bytes long")]
    SessionSecretTooShort,

    #[error("PORT must be a number between 1 and 65535, got '{0}'")]
    InvalidPort(String),
}

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_path: String,
    pub session_secret: String,
    pub frontend_origin: String,
    /// Enables secure cookies; only set behind HTTPS.
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port_raw = lookup("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let port = match port_raw.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => return Err(ConfigError::InvalidPort(port_raw)),
        };

        let data_path = lookup("DATA_PATH").unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());

        let session_secret = lookup("SESSION_SECRET").ok_or(ConfigError::MissingSessionSecret)?;
        if session_secret.len() < MIN_SESSION_SECRET_LENGTH {
            return Err(ConfigError::SessionSecretTooShort);
        }

        let frontend_origin =
            lookup("FRONTEND_ORIGIN").unwrap_or_else(|| DEFAULT_FRONTEND_ORIGIN.to_string());

        let production = lookup("PRODUCTION")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            host,
            port,
            data_path,
            session_secret,
            frontend_origin,
            production,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
