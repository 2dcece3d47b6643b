//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Default registration link attached to every broadcast.
pub const DEFAULT_REGISTRATION_URL: &str = "https://broker-qx.pro/sign-up/?lid=1179650";

/// Runtime configuration for the bot process.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API token.
    pub bot_token: SecretString,
    /// Chat that receives finished signals (numeric id or `@channel`).
    pub channel_id: String,
    /// Port for the liveness endpoint.
    pub port: u16,
    /// Bot API base URL, overridable for tests and local proxies.
    pub api_base: String,
    /// Link attached to broadcasts.
    pub registration_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

        let channel_id = lookup("SIGNAL_CHANNEL_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("SIGNAL_CHANNEL_ID".into()))?;

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: format!("{raw:?} is not a valid port"),
            })?,
            None => 5000,
        };

        let poll_timeout_secs: u64 = match lookup("TELEGRAM_POLL_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TELEGRAM_POLL_TIMEOUT_SECS".into(),
                message: format!("{raw:?} is not a number of seconds"),
            })?,
            None => 30,
        };

        let api_base = lookup("TELEGRAM_API_BASE")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let registration_url = lookup("SIGNAL_REGISTRATION_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGISTRATION_URL.to_string());

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            channel_id,
            port,
            api_base,
            registration_url,
            poll_timeout: Duration::from_secs(poll_timeout_secs),
        })
    }
}
