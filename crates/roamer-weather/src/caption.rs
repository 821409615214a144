//! Post text built from a weather snapshot.

use crate::types::WeatherSnapshot;

/// Build the caption for a post.
///
/// Provider text is interpolated as-is; nothing is escaped or stripped.
pub fn compose(snapshot: &WeatherSnapshot, country_name: &str) -> String {
    format!(
        "It is {}F in {}, {} {}! With {} and {}% humidity, it feels like {}F.",
        snapshot.temperature_f,
        snapshot.city_display_name,
        country_name,
        snapshot.category.symbol(),
        snapshot.description,
        snapshot.humidity_pct,
        snapshot.feels_like_f,
    )
}
