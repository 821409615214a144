use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use roamer_catalog::{CityCatalog, CountryCrosswalk};
use roamer_core::{BotError, Config, MediaUploader, Publisher};
use roamer_media::{ImageScraper, IterationWorkspace, MediaCollector};
use roamer_weather::{compose, WeatherProvider};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::types::{IterationOutcome, RunSummary, Stage};

/// Loop settings, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Parent of the per-iteration scrape directories
    pub images_root: PathBuf,

    /// Wait after each scheduled slot
    pub interval: Duration,

    /// Restarts allowed within one slot before it is skipped
    pub max_restarts: u32,

    /// Stop after the first slot
    pub once: bool,
}

impl BotSettings {
    pub fn from_config(config: &Config, once: bool) -> Self {
        Self {
            images_root: config.images.root_dir.clone(),
            interval: config.schedule.interval(),
            max_restarts: config.schedule.max_restarts,
            once,
        }
    }
}

/// Ties the reference data and the three external services together.
pub struct Bot {
    catalog: Arc<CityCatalog>,
    crosswalk: Arc<CountryCrosswalk>,
    weather: WeatherProvider,
    collector: MediaCollector,
    scraper: Arc<dyn ImageScraper>,
    uploader: Arc<dyn MediaUploader>,
    publisher: Arc<dyn Publisher>,
    settings: BotSettings,
}

impl Bot {
    pub fn new(
        catalog: Arc<CityCatalog>,
        crosswalk: Arc<CountryCrosswalk>,
        weather: WeatherProvider,
        scraper: Arc<dyn ImageScraper>,
        uploader: Arc<dyn MediaUploader>,
        publisher: Arc<dyn Publisher>,
        settings: BotSettings,
    ) -> Self {
        Self {
            catalog,
            crosswalk,
            weather,
            collector: MediaCollector::new(),
            scraper,
            uploader,
            publisher,
            settings,
        }
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    /// Post on schedule until cancelled, or once with `settings.once`.
    ///
    /// Cancellation is a clean stop and returns the summary so far.
    ///
    /// # Errors
    /// The first fatal error.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, BotError> {
        let mut summary = RunSummary::default();

        loop {
            match self.run_slot(cancel, &mut summary).await {
                Ok(()) => {}
                Err(BotError::Cancelled) => {
                    tracing::info!("Stopping: cancelled");
                    return Ok(summary);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fatal error, stopping");
                    return Err(e);
                }
            }

            if self.settings.once {
                return Ok(summary);
            }

            tracing::info!(
                "Next post in {} minutes",
                self.settings.interval.as_secs() / 60
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stopping: cancelled while waiting");
                    return Ok(summary);
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }

    /// One scheduled post, restarting from city selection as needed.
    async fn run_slot(
        &self,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), BotError> {
        let mut restarts = 0;

        loop {
            match self.run_iteration(cancel).await? {
                IterationOutcome::Posted { .. } => {
                    summary.posts += 1;
                    return Ok(());
                }
                IterationOutcome::Restart { stage, reason } => {
                    summary.restarts += 1;
                    restarts += 1;
                    if restarts > self.settings.max_restarts {
                        tracing::error!(
                            %stage,
                            restarts,
                            "Skipping this post after repeated failures: {}",
                            reason
                        );
                        summary.skipped += 1;
                        return Ok(());
                    }
                    tracing::warn!(
                        %stage,
                        restarts,
                        max_restarts = self.settings.max_restarts,
                        "Restarting from city selection: {}",
                        reason
                    );
                }
            }
        }
    }

    /// Run one iteration from city selection to cleanup.
    ///
    /// Nothing is published unless the weather lookup succeeded and every
    /// photo was collected. The iteration's scrape directory is removed on
    /// every exit path.
    ///
    /// # Errors
    /// Fatal errors, and [`BotError::Cancelled`].
    #[instrument(skip(self, cancel), level = "info")]
    pub async fn run_iteration(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IterationOutcome, BotError> {
        if cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }

        let city = self.catalog.pick_random();
        tracing::info!(
            stage = %Stage::SelectCity,
            city_id = city.id,
            country = %city.country_code,
            "Selected city {}",
            city.name
        );

        let country = self.crosswalk.lookup(&city.country_code)?.to_string();
        tracing::debug!(stage = %Stage::LookupCountry, "Country is {}", country);

        let snapshot = match self.weather.fetch_weather(city.id, cancel).await {
            Ok(snapshot) => snapshot,
            Err(e) => return restart_or_fail(Stage::FetchWeather, e.into_bot_error(city.id)),
        };

        let caption = compose(&snapshot, &country);
        tracing::info!(stage = %Stage::ComposeCaption, "Caption: {}", caption);

        let city_name = if snapshot.city_display_name.is_empty() {
            city.name.as_str()
        } else {
            snapshot.city_display_name.as_str()
        };

        let workspace = IterationWorkspace::create(&self.settings.images_root).map_err(|e| {
            BotError::Workspace(format!(
                "cannot create scrape directory under {}: {}",
                self.settings.images_root.display(),
                e
            ))
        })?;

        let collected = tokio::select! {
            _ = cancel.cancelled() => return Err(BotError::Cancelled),
            result = self.collector.collect(
                self.scraper.as_ref(),
                self.uploader.as_ref(),
                &workspace,
                &snapshot.description,
                city_name,
                &country,
            ) => result,
        };
        let media = match collected {
            Ok(media) => media,
            Err(e) => return restart_or_fail(Stage::CollectMedia, e.into()),
        };

        if cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }

        let post_id = self.publisher.publish(&caption, &media).await?;
        tracing::info!(stage = %Stage::Publish, city_id = city.id, %post_id, "Posted");

        tracing::debug!(stage = %Stage::Cleanup, "Removing {}", workspace.path().display());
        workspace.close();

        Ok(IterationOutcome::Posted {
            post_id,
            city_id: city.id,
            caption,
        })
    }
}

fn restart_or_fail(stage: Stage, reason: BotError) -> Result<IterationOutcome, BotError> {
    if reason.is_recoverable() {
        Ok(IterationOutcome::Restart { stage, reason })
    } else {
        Err(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roamer_catalog::CityRecord;
    use roamer_core::{MediaHandle, MediaSet, PlatformError, PostId, RetryConfig};
    use roamer_media::MediaError;
    use secrecy::SecretString;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Writes `location` files for every query except the weather one,
    /// which gets a single file.
    struct FixedScraper {
        location: usize,
    }

    #[async_trait]
    impl ImageScraper for FixedScraper {
        async fn scrape(&self, query: &str, _limit: usize, dest: &Path) -> Result<usize, MediaError> {
            let count = if query == "clear sky" { 1 } else { self.location };
            std::fs::create_dir_all(dest)?;
            for i in 1..=count {
                std::fs::write(dest.join(format!("Image_{}.jpg", i)), b"jpeg")?;
            }
            Ok(count)
        }
    }

    #[derive(Default)]
    struct CountingUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaUploader for CountingUploader {
        async fn upload(&self, _path: &Path) -> Result<MediaHandle, PlatformError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(MediaHandle(n.to_string()))
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn publish(&self, _caption: &str, _media: &MediaSet) -> Result<PostId, PlatformError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(PlatformError::PublishFailed("403: duplicate".into()));
            }
            Ok(PostId(format!("post-{}", n)))
        }
    }

    async fn weather_server(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn clear_sky() -> serde_json::Value {
        serde_json::json!({
            "cod": 200,
            "weather": [{"description": "clear sky", "main": "Clear"}],
            "main": {"temp": 72, "feels_like": 70, "humidity": 40},
            "name": "Springfield"
        })
    }

    struct Harness {
        bot: Bot,
        uploader: Arc<CountingUploader>,
        publisher: Arc<CountingPublisher>,
        images: tempfile::TempDir,
    }

    fn harness(
        server: &MockServer,
        location_photos: usize,
        publisher: CountingPublisher,
        max_restarts: u32,
        once: bool,
    ) -> Harness {
        let catalog = CityCatalog::from_records(vec![CityRecord {
            id: 1,
            name: "Springfield".into(),
            country_code: "US".into(),
        }])
        .unwrap();
        let crosswalk = CountryCrosswalk::from_pairs([("US", "United States")]);
        let weather = WeatherProvider::new(
            SecretString::from("key".to_string()),
            &server.uri(),
            RetryConfig::immediate(1),
        )
        .unwrap();
        let images = tempfile::tempdir().unwrap();
        let uploader = Arc::new(CountingUploader::default());
        let publisher = Arc::new(publisher);

        let bot = Bot::new(
            Arc::new(catalog),
            Arc::new(crosswalk),
            weather,
            Arc::new(FixedScraper { location: location_photos }),
            uploader.clone(),
            publisher.clone(),
            BotSettings {
                images_root: images.path().to_path_buf(),
                interval: Duration::from_secs(3600),
                max_restarts,
                once,
            },
        );

        Harness {
            bot,
            uploader,
            publisher,
            images,
        }
    }

    fn leftover_dirs(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn test_iteration_posts_and_cleans_up() {
        let server = weather_server(200, clear_sky()).await;
        let h = harness(&server, 3, CountingPublisher::default(), 0, true);

        let outcome = h.bot.run_iteration(&CancellationToken::new()).await.unwrap();

        assert!(
            matches!(outcome, IterationOutcome::Posted { ref post_id, city_id: 1, .. } if post_id.0 == "post-1"),
            "unexpected outcome: {:?}",
            outcome
        );
        assert_eq!(h.uploader.calls.load(Ordering::SeqCst), 4);
        assert_eq!(leftover_dirs(h.images.path()), 0);
    }

    #[tokio::test]
    async fn test_unknown_city_weather_restarts() {
        let server = weather_server(404, serde_json::json!({"cod": "404"})).await;
        let h = harness(&server, 3, CountingPublisher::default(), 0, true);

        let outcome = h.bot.run_iteration(&CancellationToken::new()).await.unwrap();

        assert!(matches!(
            outcome,
            IterationOutcome::Restart {
                stage: Stage::FetchWeather,
                reason: BotError::TransientFetch { city_id: 1, attempts: 2 }
            }
        ));
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_weather_key_is_fatal() {
        let server = weather_server(401, serde_json::json!({"cod": 401})).await;
        let h = harness(&server, 3, CountingPublisher::default(), 0, true);

        let err = h.bot.run_iteration(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, BotError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_publish_failure_is_fatal_and_cleans_up() {
        let server = weather_server(200, clear_sky()).await;
        let publisher = CountingPublisher {
            fail: true,
            ..Default::default()
        };
        let h = harness(&server, 3, publisher, 0, true);

        let err = h.bot.run(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, BotError::Publish(_)));
        assert_eq!(leftover_dirs(h.images.path()), 0);
    }

    #[tokio::test]
    async fn test_slot_skipped_after_max_restarts() {
        let server = weather_server(200, clear_sky()).await;
        let h = harness(&server, 2, CountingPublisher::default(), 2, true);

        let summary = h.bot.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                posts: 0,
                skipped: 1,
                restarts: 3
            }
        );
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.uploader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(leftover_dirs(h.images.path()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = weather_server(200, clear_sky()).await;
        let h = harness(&server, 3, CountingPublisher::default(), 0, false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = h.bot.run(&cancel).await.unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_interval_stops_loop() {
        let server = weather_server(200, clear_sky()).await;
        let h = harness(&server, 3, CountingPublisher::default(), 0, false);
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        let publisher = h.publisher.clone();
        tokio::spawn(async move {
            while publisher.calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            stopper.cancel();
        });

        let summary = tokio::time::timeout(Duration::from_secs(10), h.bot.run(&cancel))
            .await
            .expect("loop should stop once cancelled")
            .unwrap();

        assert_eq!(summary.posts, 1);
    }
}
