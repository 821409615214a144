use std::fmt;

use roamer_core::{BotError, PostId};

/// Steps of one iteration, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectCity,
    LookupCountry,
    FetchWeather,
    ComposeCaption,
    CollectMedia,
    Publish,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SelectCity => "select-city",
            Stage::LookupCountry => "lookup-country",
            Stage::FetchWeather => "fetch-weather",
            Stage::ComposeCaption => "compose-caption",
            Stage::CollectMedia => "collect-media",
            Stage::Publish => "publish",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// How one iteration ended, short of a fatal error.
#[derive(Debug)]
pub enum IterationOutcome {
    /// The post went out and the workspace was removed.
    Posted {
        post_id: PostId,
        city_id: u64,
        caption: String,
    },

    /// Start over from city selection.
    Restart { stage: Stage, reason: BotError },
}

impl IterationOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, IterationOutcome::Posted { .. })
    }
}

/// Totals reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Posts published
    pub posts: u32,

    /// Scheduled slots given up after too many restarts
    pub skipped: u32,

    /// Iterations restarted from city selection
    pub restarts: u32,
}
