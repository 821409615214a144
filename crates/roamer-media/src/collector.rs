use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use roamer_core::{MediaSet, MediaUploader};
use tracing::instrument;

use crate::error::MediaError;
use crate::scraper::ImageScraper;
use crate::workspace::IterationWorkspace;

/// Photos of the city required for a post.
pub const LOCATION_PHOTO_COUNT: usize = 3;

/// Photos of the weather required for a post.
pub const WEATHER_PHOTO_COUNT: usize = 1;

/// Scrapes, verifies and uploads the photos for one post.
#[derive(Debug, Clone)]
pub struct MediaCollector {
    location_count: usize,
    weather_count: usize,
}

impl Default for MediaCollector {
    fn default() -> Self {
        Self {
            location_count: LOCATION_PHOTO_COUNT,
            weather_count: WEATHER_PHOTO_COUNT,
        }
    }
}

impl MediaCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search query for photos of a place
    pub fn location_query(city_name: &str, country_name: &str) -> String {
        format!("{} {}", city_name, country_name)
    }

    /// Scrape photos for the weather and the place, check the counts, and
    /// upload them: location photos first, then the weather photo.
    ///
    /// Nothing is uploaded unless both directories hold exactly the expected
    /// number of files.
    ///
    /// # Errors
    /// `CountMismatch` when a directory has the wrong number of files, or the
    /// scrape/upload failure.
    #[instrument(skip(self, scraper, uploader, workspace), level = "info")]
    pub async fn collect(
        &self,
        scraper: &dyn ImageScraper,
        uploader: &dyn MediaUploader,
        workspace: &IterationWorkspace,
        description: &str,
        city_name: &str,
        country_name: &str,
    ) -> Result<MediaSet, MediaError> {
        let location_query = Self::location_query(city_name, country_name);
        let weather_dir = workspace.query_dir(description);
        let location_dir = workspace.query_dir(&location_query);

        scraper
            .scrape(description, self.weather_count, &weather_dir)
            .await?;
        scraper
            .scrape(&location_query, self.location_count, &location_dir)
            .await?;

        let location_files = expect_files(&location_dir, &location_query, self.location_count)?;
        let weather_files = expect_files(&weather_dir, description, self.weather_count)?;

        let mut media = MediaSet::new();
        for file in location_files.iter().chain(weather_files.iter()) {
            let handle = uploader.upload(file).await?;
            tracing::debug!("Uploaded {} as {}", file.display(), handle);
            media.push(handle);
        }

        tracing::info!("Collected {} media handles", media.len());
        Ok(media)
    }
}

/// List `dir` and require exactly `expected` files.
fn expect_files(dir: &Path, query: &str, expected: usize) -> Result<Vec<PathBuf>, MediaError> {
    let files = list_files(dir)?;

    if files.len() != expected {
        tracing::warn!(
            query,
            expected,
            found = files.len(),
            "Unexpected number of scraped images"
        );
        return Err(MediaError::CountMismatch {
            query: query.to_string(),
            expected,
            found: files.len(),
        });
    }

    Ok(files)
}

/// Regular files in `dir`, sorted by name. A missing directory is empty.
fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
