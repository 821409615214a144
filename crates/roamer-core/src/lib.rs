pub mod config;
pub mod error;
pub mod retry;
pub mod traits;

pub use crate::config::{
    Config, ConfigIssue, DataConfig, ImagesConfig, ScheduleConfig, TwitterConfig, ValidationResult,
    WeatherConfig,
};
pub use error::{BotError, ConfigError, PlatformError};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryError};
pub use traits::{MediaHandle, MediaSet, MediaUploader, PostId, Publisher, MAX_MEDIA_PER_POST};

use anyhow::Result;

/// Initialize logging for the bot process
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Roamer core initialized");
    Ok(())
}
