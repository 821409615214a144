use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;
use crate::retry::RetryConfig;

/// Prefix for environment variables, e.g. `ROAMER_WEATHER__API_KEY`
pub const ENV_PREFIX: &str = "ROAMER";

/// Separator between nested config keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// One problem found by [`Config::validate`], keyed by dotted setting name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub key: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.message)
    }
}

/// Errors stop startup; warnings are only logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, key: &str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            key: key.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, key: &str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            key: key.to_string(),
            message: message.into(),
        });
    }

    /// Errors on one line, `; `-separated
    pub fn error_summary(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        parts.join("; ")
    }
}

/// Immutable process configuration, built once at startup.
///
/// Secrets come from the environment; everything else may also come from an
/// optional TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub weather: WeatherConfig,

    pub twitter: TwitterConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key
    pub api_key: SecretString,

    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

/// OAuth 1.0a user-context credentials for the posting platform
#[derive(Debug, Deserialize)]
pub struct TwitterConfig {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub access_token: SecretString,
    pub access_token_secret: SecretString,

    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,

    #[serde(default = "default_twitter_upload_base")]
    pub upload_base: String,
}

fn default_twitter_api_base() -> String {
    "https://api.twitter.com".to_string()
}

fn default_twitter_upload_base() -> String {
    "https://upload.twitter.com".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ImagesConfig {
    /// Image search endpoint
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Subscription key sent with search requests, if the provider needs one
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Directory under which per-iteration scrape directories are created
    #[serde(default = "default_images_root")]
    pub root_dir: PathBuf,
}

fn default_search_url() -> String {
    "https://api.bing.microsoft.com/v7.0/images/search".to_string()
}

fn default_images_root() -> PathBuf {
    PathBuf::from("images")
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            api_key: None,
            root_dir: default_images_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// JSON city catalog
    #[serde(default = "default_cities_path")]
    pub cities_path: PathBuf,

    /// CSV country-code crosswalk
    #[serde(default = "default_countries_path")]
    pub countries_path: PathBuf,
}

fn default_cities_path() -> PathBuf {
    PathBuf::from("data/city.list.json")
}

fn default_countries_path() -> PathBuf {
    PathBuf::from("data/country-codes.csv")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cities_path: default_cities_path(),
            countries_path: default_countries_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes to wait between successful posts
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Restarts from city selection allowed before a slot is skipped
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Weather fetch retry budget
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_max_restarts() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            max_restarts: default_max_restarts(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.initial_delay_ms, self.max_delay_ms)
    }
}

impl Config {
    /// Load configuration from the process environment, layered over an
    /// optional TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file is malformed or a required secret is
    /// missing.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(file, None)
    }

    /// Like [`Config::load`], but reads variables from `vars` instead of the
    /// process environment.
    ///
    /// # Errors
    /// Same as [`Config::load`].
    pub fn from_vars(
        file: Option<&Path>,
        vars: ::config::Map<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::build(file, Some(vars))
    }

    fn build(
        file: Option<&Path>,
        vars: Option<::config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            builder = builder.add_source(::config::File::from(path.to_path_buf()));
        }

        let environment = ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .source(vars);

        let config = builder
            .add_source(environment)
            .build()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.try_deserialize::<Config>().map_err(|e| match e {
            ::config::ConfigError::NotFound(key) => ConfigError::MissingSetting(key),
            other => {
                let message = other.to_string();
                if message.contains("missing field") {
                    ConfigError::MissingSetting(message)
                } else {
                    ConfigError::ParseError(message)
                }
            }
        })
    }

    /// Check URLs and secrets. Run after any command-line overrides.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let urls = [
            ("weather.base_url", &self.weather.base_url),
            ("twitter.api_base", &self.twitter.api_base),
            ("twitter.upload_base", &self.twitter.upload_base),
            ("images.search_url", &self.images.search_url),
        ];
        for (key, url) in urls {
            validate_url(url, key, &mut result);
        }

        let secrets = [
            ("weather.api_key", &self.weather.api_key),
            ("twitter.consumer_key", &self.twitter.consumer_key),
            ("twitter.consumer_secret", &self.twitter.consumer_secret),
            ("twitter.access_token", &self.twitter.access_token),
            ("twitter.access_token_secret", &self.twitter.access_token_secret),
        ];
        for (key, secret) in secrets {
            if secret.expose_secret().trim().is_empty() {
                result.error(key, "must not be empty");
            }
        }

        if self.images.api_key.is_none() {
            result.warning(
                "images.api_key",
                "no image search key, requests are sent unauthenticated",
            );
        }

        if self.schedule.interval_minutes == 0 {
            result.warning(
                "schedule.interval_minutes",
                "0 minutes, posts will be made back to back",
            );
        }

        if self.schedule.initial_delay_ms > self.schedule.max_delay_ms {
            result.error(
                "schedule.initial_delay_ms",
                "larger than schedule.max_delay_ms",
            );
        }

        for (key, path) in [
            ("data.cities_path", &self.data.cities_path),
            ("data.countries_path", &self.data.countries_path),
        ] {
            if !path.exists() {
                result.warning(key, format!("{} does not exist", path.display()));
            }
        }

        result
    }
}

fn validate_url(url_str: &str, key: &str, result: &mut ValidationResult) {
    let url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(e) => return result.error(key, format!("not a URL: {}", e)),
    };

    if !matches!(url.scheme(), "http" | "https") {
        result.error(key, format!("expected an http or https URL, got {}", url.scheme()));
    }
    if url.host().is_none() {
        result.error(key, "URL has no host");
    }
}
