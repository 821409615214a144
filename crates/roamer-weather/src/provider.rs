use std::time::Duration;

use reqwest::{Client, StatusCode};
use roamer_core::{with_retry, RetryConfig, RetryDecision, RetryError, WeatherConfig};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::types::{ApiCurrentWeather, WeatherError, WeatherSnapshot};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Value of the response `cod` field meaning the city id is unknown.
const NOT_FOUND_SENTINEL: u64 = 404;

/// Fetches current weather by city id, in imperial units.
#[derive(Debug)]
pub struct WeatherProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
    retry: RetryConfig,
}

impl WeatherProvider {
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        retry: RetryConfig,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &WeatherConfig, retry: RetryConfig) -> Result<Self, WeatherError> {
        let api_key = SecretString::from(config.api_key.expose_secret().to_owned());
        Self::new(api_key, &config.base_url, retry)
    }

    /// Fetch the current weather for a city, retrying "not found" responses
    /// and transient failures within the retry budget.
    ///
    /// # Errors
    /// `RetriesExhausted` once the budget is spent, `InvalidApiKey` on 401,
    /// `Cancelled` if `cancel` fires, or the first non-retryable failure.
    #[instrument(skip(self, cancel), level = "info")]
    pub async fn fetch_weather(
        &self,
        city_id: u64,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let result = with_retry(
            &self.retry,
            cancel,
            |e: &WeatherError| {
                if e.is_retryable() {
                    RetryDecision::Retry
                } else {
                    RetryDecision::NoRetry
                }
            },
            |attempt| {
                tracing::debug!(city_id, attempt, "Requesting current weather");
                self.fetch_once(city_id)
            },
        )
        .await;

        match result {
            Ok(snapshot) => {
                tracing::info!(
                    city_id,
                    city = %snapshot.city_display_name,
                    category = ?snapshot.category,
                    "Fetched weather"
                );
                Ok(snapshot)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(city_id, attempts, "Giving up on weather: {}", last);
                Err(WeatherError::RetriesExhausted {
                    city_id,
                    attempts,
                    last: last.to_string(),
                })
            }
            Err(RetryError::Permanent(e)) => Err(e),
            Err(RetryError::Cancelled) => Err(WeatherError::Cancelled),
        }
    }

    /// One request, no retries.
    async fn fetch_once(&self, city_id: u64) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let id = city_id.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", id.as_str()),
                ("appid", self.api_key.expose_secret()),
                ("units", "imperial"),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // The provider reports "not found" in the body's `cod` field, as a
        // string or a number, and may also use the HTTP status.
        let body: Option<serde_json::Value> = serde_json::from_str(&text).ok();
        if body.as_ref().and_then(response_code) == Some(NOT_FOUND_SENTINEL) {
            tracing::warn!(city_id, "Weather provider returned not found");
            return Err(WeatherError::NotFound(city_id));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(WeatherError::InvalidApiKey);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(WeatherError::RateLimited);
        }
        if status.is_server_error() {
            return Err(WeatherError::ServerError {
                status: status.as_u16(),
                message: text,
            });
        }
        if !status.is_success() {
            return Err(WeatherError::ApiError(format!("{}: {}", status, text)));
        }

        let body = body.ok_or_else(|| WeatherError::Parse("response is not JSON".into()))?;
        let api: ApiCurrentWeather =
            serde_json::from_value(body).map_err(|e| WeatherError::Parse(e.to_string()))?;
        api.into_snapshot()
    }
}

/// Read the `cod` field, which the provider sends as either `200` or `"404"`.
fn response_code(body: &serde_json::Value) -> Option<u64> {
    match body.get("cod")? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
