//! Error taxonomy for the bot.
//!
//! Every component crate has its own error enum and converts into
//! [`BotError`]. The loop uses [`BotError::is_fatal`] to decide whether to
//! stop the process or restart from city selection.

use thiserror::Error;

/// Top-level bot error.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Reference data unavailable: {0}")]
    DataLoad(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Weather for city {city_id} still unavailable after {attempts} attempts")]
    TransientFetch { city_id: u64, attempts: u32 },

    #[error("Weather lookup for city {city_id} failed: {message}")]
    Weather { city_id: u64, message: String },

    #[error("Expected {expected} images for '{query}', found {found}")]
    MediaCountMismatch {
        query: String,
        expected: usize,
        found: usize,
    },

    #[error("Image scraping failed: {0}")]
    Media(String),

    #[error("Working directory error: {0}")]
    Workspace(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Cancelled")]
    Cancelled,
}

impl BotError {
    /// Errors that must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::DataLoad(_)
                | BotError::Config(_)
                | BotError::Authentication(_)
                | BotError::Workspace(_)
                | BotError::Upload(_)
                | BotError::Publish(_)
        )
    }

    /// Errors that restart the iteration from city selection.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BotError::TransientFetch { .. }
                | BotError::Weather { .. }
                | BotError::MediaCountMismatch { .. }
                | BotError::Media(_)
        )
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

/// Failures reported by the posting platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Credentials rejected: {0}")]
    Authentication(String),

    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Post rejected: {0}")]
    PublishFailed(String),

    #[error("Caption is {length} characters, limit is {limit}")]
    CaptionTooLong { length: usize, limit: usize },

    #[error("{count} media attached, limit is {limit}")]
    TooManyMedia { count: usize, limit: usize },
}

impl From<PlatformError> for BotError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Authentication(msg) => BotError::Authentication(msg),
            PlatformError::UploadFailed(msg) => BotError::Upload(msg),
            other => BotError::Publish(other.to_string()),
        }
    }
}
