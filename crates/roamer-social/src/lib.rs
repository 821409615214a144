//! Posting platform client.
//!
//! Signs requests with OAuth 1.0a user credentials, uploads media and
//! publishes posts. A dry-run pair of implementations logs instead.

pub mod client;
pub mod dry_run;
pub mod oauth;

pub use client::{caption_length, TwitterClient, MAX_CAPTION_CHARS};
pub use dry_run::{DryRunPublisher, DryRunUploader};
pub use oauth::OAuthCredentials;
