use roamer_core::BotError;
use serde::Deserialize;

/// Provider's coarse weather classification (the `main` field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherCategory {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Clear,
    Clouds,
    /// Mist, haze, fog, dust and anything else the provider reports
    Other(String),
}

impl WeatherCategory {
    /// Parse the provider's category, ignoring case
    pub fn parse(main: &str) -> Self {
        match main.trim().to_ascii_lowercase().as_str() {
            "thunderstorm" => Self::Thunderstorm,
            "drizzle" => Self::Drizzle,
            "rain" => Self::Rain,
            "snow" => Self::Snow,
            "clear" => Self::Clear,
            "clouds" => Self::Clouds,
            _ => Self::Other(main.to_string()),
        }
    }

    /// Symbol shown in the caption
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "\u{26A1}",
            Self::Drizzle | Self::Rain => "\u{2614}",
            Self::Snow => "\u{2744}",
            Self::Clear => "\u{2600}",
            Self::Clouds => "\u{26C5}",
            Self::Other(_) => "\u{1F301}",
        }
    }
}

/// Current conditions for one city, in Fahrenheit.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub description: String,
    pub category: WeatherCategory,
    pub temperature_f: f64,
    pub feels_like_f: f64,
    pub temp_min_f: Option<f64>,
    pub temp_max_f: Option<f64>,
    pub humidity_pct: u32,
    pub city_display_name: String,
}

// OpenWeatherMap response shapes

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCurrentWeather {
    pub weather: Vec<ApiCondition>,
    pub main: ApiMain,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCondition {
    pub main: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMain {
    pub temp: f64,
    pub feels_like: f64,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    pub humidity: u32,
}

impl ApiCurrentWeather {
    pub(crate) fn into_snapshot(self) -> Result<WeatherSnapshot, WeatherError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Parse("response has no weather conditions".into()))?;

        Ok(WeatherSnapshot {
            description: condition.description,
            category: WeatherCategory::parse(&condition.main),
            temperature_f: self.main.temp,
            feels_like_f: self.main.feels_like,
            temp_min_f: self.main.temp_min,
            temp_max_f: self.main.temp_max,
            humidity_pct: self.main.humidity,
            city_display_name: self.name,
        })
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("City {0} not found by weather provider")]
    NotFound(u64),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limited by weather provider")]
    RateLimited,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("City {city_id} still failing after {attempts} attempts: {last}")]
    RetriesExhausted {
        city_id: u64,
        attempts: u32,
        last: String,
    },

    #[error("Weather fetch cancelled")]
    Cancelled,
}

impl WeatherError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::RateLimited | Self::ServerError { .. } => true,
            Self::Network(e) => {
                roamer_core::retry::is_retryable_error(e) == roamer_core::RetryDecision::Retry
            }
            _ => false,
        }
    }

    /// Convert into the bot taxonomy, attaching the city being fetched.
    pub fn into_bot_error(self, city_id: u64) -> BotError {
        match self {
            Self::RetriesExhausted { city_id, attempts, .. } => {
                BotError::TransientFetch { city_id, attempts }
            }
            Self::InvalidApiKey => {
                BotError::Authentication("weather provider rejected the API key".into())
            }
            Self::Cancelled => BotError::Cancelled,
            other => BotError::Weather {
                city_id,
                message: other.to_string(),
            },
        }
    }
}
