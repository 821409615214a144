//! Image search and download.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use roamer_core::ImagesConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use crate::error::MediaError;

const REQUEST_TIMEOUT_SECS: u64 = 20;
const USER_AGENT: &str = concat!("roamer/", env!("CARGO_PKG_VERSION"));
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Finds images for a free-text query and saves them to a directory.
#[async_trait]
pub trait ImageScraper: Send + Sync {
    /// Save up to `limit` images for `query` into `dest`, creating it if
    /// needed. Returns how many files were written.
    async fn scrape(&self, query: &str, limit: usize, dest: &Path) -> Result<usize, MediaError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    content_url: String,
    #[serde(default)]
    encoding_format: Option<String>,
}

/// Scraper backed by a Bing-style image search JSON API.
#[derive(Debug)]
pub struct HttpImageScraper {
    client: Client,
    search_url: String,
    api_key: Option<SecretString>,
}

impl HttpImageScraper {
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(search_url: &str, api_key: Option<SecretString>) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            search_url: search_url.to_string(),
            api_key,
        })
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &ImagesConfig) -> Result<Self, MediaError> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_owned()));
        Self::new(&config.search_url, api_key)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, MediaError> {
        let count = limit.to_string();
        let mut request = self
            .client
            .get(&self.search_url)
            .query(&[("q", query), ("count", count.as_str())]);

        if let Some(key) = &self.api_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::Search {
                query: query.to_string(),
                message: format!("{}: {}", status, text),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| MediaError::Search {
            query: query.to_string(),
            message: format!("JSON parse error: {}", e),
        })?;

        Ok(body.value)
    }

    /// Download one result to `dest/Image_{index}.{ext}`.
    async fn download(
        &self,
        result: &SearchResult,
        dest: &Path,
        index: usize,
    ) -> Result<(), MediaError> {
        let response = self
            .client
            .get(&result.content_url)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        if let Some(ct) = &content_type {
            if !ct.starts_with("image/") {
                return Err(MediaError::Search {
                    query: result.content_url.clone(),
                    message: format!("not an image ({})", ct),
                });
            }
        }

        let ext = extension_for(result, content_type.as_deref());
        let bytes = response.bytes().await?;
        let path = dest.join(format!("Image_{}.{}", index, ext));
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[async_trait]
impl ImageScraper for HttpImageScraper {
    #[instrument(skip(self, dest), level = "info")]
    async fn scrape(&self, query: &str, limit: usize, dest: &Path) -> Result<usize, MediaError> {
        tokio::fs::create_dir_all(dest).await?;

        let results = self.search(query, limit).await?;
        tracing::debug!("Search for '{}' returned {} results", query, results.len());

        let mut saved = 0;
        for result in results.iter().take(limit) {
            match self.download(result, dest, saved + 1).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::warn!(
                        "Skipping image for '{}' from {}: {}",
                        query,
                        result.content_url,
                        e
                    );
                }
            }
        }

        tracing::info!("Saved {} of {} images for '{}'", saved, limit, query);
        Ok(saved)
    }
}

/// File extension from the search result, the response type, or the URL.
///
/// Only short ASCII alphanumeric extensions are accepted from any source.
fn extension_for(result: &SearchResult, content_type: Option<&str>) -> String {
    let from_format = || result.encoding_format.as_deref().and_then(safe_extension);

    let from_content_type = || {
        content_type
            .and_then(|ct| ct.strip_prefix("image/"))
            .map(|sub| sub.split(';').next().unwrap_or(sub))
            .and_then(safe_extension)
    };

    let from_url = || {
        let path = result.content_url.split(['?', '#']).next().unwrap_or_default();
        let file = path.rsplit('/').next().unwrap_or_default();
        file.rsplit_once('.').and_then(|(_, ext)| safe_extension(ext))
    };

    from_format()
        .or_else(from_content_type)
        .or_else(from_url)
        .unwrap_or_else(|| "jpg".to_string())
}

fn safe_extension(raw: &str) -> Option<String> {
    let ext = match raw.trim().to_ascii_lowercase().as_str() {
        "jpeg" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        other => other.to_string(),
    };
    let valid = !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}
