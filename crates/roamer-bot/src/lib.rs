//! The posting loop.
//!
//! One iteration picks a city, fetches its weather, builds the caption,
//! collects four photos and publishes. Iterations that hit a recoverable
//! problem start over from city selection; fatal errors end the run.

pub mod bot;
pub mod types;

pub use bot::{Bot, BotSettings};
pub use types::{IterationOutcome, RunSummary, Stage};
