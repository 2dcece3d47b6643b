//! Error types for the signal bot.

use crate::wizard::WizardState;

/// Error raised while handling one bot event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors. Reported by the binary before startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Telegram transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Rate limited on channel {name}")]
    RateLimited { name: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Errors raised while advancing a wizard session.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    /// The token does not belong to the menu shown in `state`.
    #[error("Unexpected selection {token:?} while in {state}")]
    UnexpectedSelection { state: WizardState, token: String },

    /// A later step was reached with an earlier field still blank.
    #[error("Missing {field} selection while in {state}")]
    MissingSelection {
        state: WizardState,
        field: &'static str,
    },
}

impl WizardError {
    /// Whether the session can carry on after this error.
    ///
    /// Unexpected selections are dropped; a missing selection means the
    /// session record is corrupt and must be aborted.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnexpectedSelection { .. })
    }
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
