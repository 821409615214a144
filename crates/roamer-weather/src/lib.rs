//! Current weather for a city, and the caption built from it.
//!
//! Uses the OpenWeatherMap current weather endpoint in imperial units.

pub mod caption;
pub mod provider;
pub mod types;

pub use caption::compose;
pub use provider::WeatherProvider;
pub use types::*;
