//! Media collection errors.

use roamer_core::{BotError, PlatformError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Expected {expected} images for '{query}', found {found}")]
    CountMismatch {
        query: String,
        expected: usize,
        found: usize,
    },

    #[error("Image search failed for '{query}': {message}")]
    Search { query: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl From<MediaError> for BotError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::CountMismatch {
                query,
                expected,
                found,
            } => BotError::MediaCountMismatch {
                query,
                expected,
                found,
            },
            MediaError::Platform(e) => e.into(),
            other => BotError::Media(other.to_string()),
        }
    }
}
