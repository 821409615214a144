//! Stand-ins used with `--dry-run`: nothing leaves the machine.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use roamer_core::{MediaHandle, MediaSet, MediaUploader, PlatformError, PostId, Publisher};

use crate::client::check_post;

/// Hands out `dry-run-media-N` handles without uploading.
#[derive(Debug, Default)]
pub struct DryRunUploader {
    next: AtomicU64,
}

impl DryRunUploader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaUploader for DryRunUploader {
    async fn upload(&self, path: &Path) -> Result<MediaHandle, PlatformError> {
        if !path.is_file() {
            return Err(PlatformError::UploadFailed(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = MediaHandle(format!("dry-run-media-{}", n));
        tracing::info!("[dry run] would upload {} as {}", path.display(), handle);
        Ok(handle)
    }
}

/// Logs the post it would have made.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    next: AtomicU64,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, caption: &str, media: &MediaSet) -> Result<PostId, PlatformError> {
        check_post(caption, media)?;

        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            caption,
            media = ?media.ids(),
            "[dry run] would publish post"
        );
        Ok(PostId(format!("dry-run-post-{}", n)))
    }
}
