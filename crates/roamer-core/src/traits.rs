//! Ports to the posting platform.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::PlatformError;

/// Most media a single post can reference.
pub const MAX_MEDIA_PER_POST: usize = 4;

/// Opaque id the platform assigns to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaHandle(pub String);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id of a submitted post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered media handles for one post: location photos first, then the
/// weather photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSet {
    handles: Vec<MediaHandle>,
}

impl MediaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: MediaHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[MediaHandle] {
        &self.handles
    }

    /// Handle ids as plain strings, in order
    pub fn ids(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.0.as_str()).collect()
    }
}

impl FromIterator<MediaHandle> for MediaSet {
    fn from_iter<I: IntoIterator<Item = MediaHandle>>(iter: I) -> Self {
        Self {
            handles: iter.into_iter().collect(),
        }
    }
}

/// Uploads a local file and returns the platform's handle for it.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<MediaHandle, PlatformError>;
}

/// Submits a post with attached media.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, caption: &str, media: &MediaSet) -> Result<PostId, PlatformError>;
}
