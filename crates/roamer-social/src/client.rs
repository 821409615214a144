//! Posting-platform REST client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use roamer_core::{
    MediaHandle, MediaSet, MediaUploader, PlatformError, PostId, Publisher, TwitterConfig,
    MAX_MEDIA_PER_POST,
};
use serde::Deserialize;
use tracing::instrument;

use crate::oauth::OAuthCredentials;

/// Longest caption the platform accepts.
pub const MAX_CAPTION_CHARS: usize = 280;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Caption length as the platform counts it (Unicode scalar values).
pub fn caption_length(caption: &str) -> usize {
    caption.chars().count()
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    screen_name: String,
}

/// Which call a failed response came from; picks the error variant.
#[derive(Debug, Clone, Copy)]
enum Call {
    Verify,
    Upload,
    Publish,
}

impl Call {
    fn failure(self, message: String) -> PlatformError {
        match self {
            Call::Verify => PlatformError::Unavailable(message),
            Call::Upload => PlatformError::UploadFailed(message),
            Call::Publish => PlatformError::PublishFailed(message),
        }
    }
}

/// Signed client for the media upload and post endpoints.
#[derive(Debug)]
pub struct TwitterClient {
    client: reqwest::Client,
    credentials: OAuthCredentials,
    api_base: String,
    upload_base: String,
}

impl TwitterClient {
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(
        credentials: OAuthCredentials,
        api_base: &str,
        upload_base: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &TwitterConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            OAuthCredentials::from_config(config),
            &config.api_base,
            &config.upload_base,
        )
    }

    /// Check the four secrets against the platform before the first post.
    ///
    /// Returns the account's screen name.
    #[instrument(skip(self), level = "info")]
    pub async fn verify_credentials(&self) -> Result<String, PlatformError> {
        let url = format!("{}/1.1/account/verify_credentials.json", self.api_base);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.credentials.authorization_header("GET", &url, &[]))
            .send()
            .await
            .map_err(|e| Call::Verify.failure(e.to_string()))?;

        let account: AccountResponse = handle_response(response, Call::Verify).await?;
        tracing::info!("Authenticated as @{}", account.screen_name);
        Ok(account.screen_name)
    }
}

#[async_trait]
impl MediaUploader for TwitterClient {
    #[instrument(skip(self), level = "info")]
    async fn upload(&self, path: &Path) -> Result<MediaHandle, PlatformError> {
        let url = format!("{}/1.1/media/upload.json", self.upload_base);

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PlatformError::UploadFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());
        let form = Form::new().part("media", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.credentials.authorization_header("POST", &url, &[]))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Call::Upload.failure(e.to_string()))?;

        let uploaded: UploadResponse = handle_response(response, Call::Upload).await?;
        tracing::debug!("Uploaded {} as media {}", path.display(), uploaded.media_id_string);
        Ok(MediaHandle(uploaded.media_id_string))
    }
}

#[async_trait]
impl Publisher for TwitterClient {
    #[instrument(skip(self, media), fields(media = media.len()), level = "info")]
    async fn publish(&self, caption: &str, media: &MediaSet) -> Result<PostId, PlatformError> {
        check_post(caption, media)?;

        let url = format!("{}/2/tweets", self.api_base);
        let mut body = serde_json::json!({ "text": caption });
        if !media.is_empty() {
            body["media"] = serde_json::json!({ "media_ids": media.ids() });
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.credentials.authorization_header("POST", &url, &[]))
            .json(&body)
            .send()
            .await
            .map_err(|e| Call::Publish.failure(e.to_string()))?;

        let created: CreatePostResponse = handle_response(response, Call::Publish).await?;
        tracing::info!("Published post {}", created.data.id);
        Ok(PostId(created.data.id))
    }
}

/// Reject posts the platform would refuse, before any request is made.
pub(crate) fn check_post(caption: &str, media: &MediaSet) -> Result<(), PlatformError> {
    let length = caption_length(caption);
    if length > MAX_CAPTION_CHARS {
        return Err(PlatformError::CaptionTooLong {
            length,
            limit: MAX_CAPTION_CHARS,
        });
    }
    if media.len() > MAX_MEDIA_PER_POST {
        return Err(PlatformError::TooManyMedia {
            count: media.len(),
            limit: MAX_MEDIA_PER_POST,
        });
    }
    Ok(())
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: Response,
    call: Call,
) -> Result<T, PlatformError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| call.failure(format!("JSON parse error: {}", e)))
    } else if status == StatusCode::UNAUTHORIZED
        || (status == StatusCode::FORBIDDEN && matches!(call, Call::Verify))
    {
        let text = response.text().await.unwrap_or_default();
        Err(PlatformError::Authentication(format!("{}: {}", status, text)))
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(PlatformError::RateLimited {
            retry_after: retry_after(&response),
        })
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(call.failure(format!("{}: {}", status, text)))
    }
}

/// Seconds to wait, from `Retry-After` or the `x-rate-limit-reset` epoch.
fn retry_after(response: &Response) -> Option<u64> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return u64::try_from(secs).ok();
    }

    header("x-rate-limit-reset").map(|reset| {
        let now = chrono::Utc::now().timestamp();
        u64::try_from(reset - now).unwrap_or(0)
    })
}
