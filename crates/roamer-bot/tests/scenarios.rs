//! End-to-end iterations against a mock weather provider, with fake photo
//! scraping and posting.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use roamer_bot::{Bot, BotSettings, IterationOutcome, Stage};
use roamer_catalog::{CityCatalog, CountryCrosswalk};
use roamer_core::{
    BotError, MediaHandle, MediaSet, MediaUploader, PlatformError, PostId, Publisher, RetryConfig,
};
use roamer_media::{ImageScraper, MediaError};
use roamer_weather::WeatherProvider;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a fixed number of images per query and records each call.
struct FakeScraper {
    location_photos: usize,
    weather_photos: usize,
    queries: Mutex<Vec<String>>,
}

impl FakeScraper {
    fn new(location_photos: usize, weather_photos: usize) -> Self {
        Self {
            location_photos,
            weather_photos,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImageScraper for FakeScraper {
    async fn scrape(&self, query: &str, _limit: usize, dest: &Path) -> Result<usize, MediaError> {
        self.queries.lock().unwrap().push(query.to_string());
        let count = if query == "Springfield United States" {
            self.location_photos
        } else {
            self.weather_photos
        };
        std::fs::create_dir_all(dest)?;
        for i in 1..=count {
            std::fs::write(dest.join(format!("Image_{}.jpg", i)), query.as_bytes())?;
        }
        Ok(count)
    }
}

/// Hands out sequential handles and remembers which files it saw.
#[derive(Default)]
struct FakeUploader {
    files: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(&self, path: &Path) -> Result<MediaHandle, PlatformError> {
        let mut files = self.files.lock().unwrap();
        files.push(path.to_path_buf());
        Ok(MediaHandle(format!("m{}", files.len())))
    }
}

#[derive(Default)]
struct FakePublisher {
    posts: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, caption: &str, media: &MediaSet) -> Result<PostId, PlatformError> {
        let mut posts = self.posts.lock().unwrap();
        posts.push((
            caption.to_string(),
            media.ids().into_iter().map(str::to_string).collect(),
        ));
        Ok(PostId(format!("p{}", posts.len())))
    }
}

fn clear_sky() -> serde_json::Value {
    serde_json::json!({
        "cod": 200,
        "weather": [{"description": "clear sky", "main": "Clear"}],
        "main": {"temp": 72, "feels_like": 70, "humidity": 40},
        "name": "Springfield"
    })
}

struct Fixture {
    data: tempfile::TempDir,
    images: tempfile::TempDir,
    scraper: Arc<FakeScraper>,
    uploader: Arc<FakeUploader>,
    publisher: Arc<FakePublisher>,
}

impl Fixture {
    fn new(scraper: FakeScraper) -> Self {
        let data = tempfile::tempdir().unwrap();
        std::fs::write(
            data.path().join("city.list.json"),
            r#"[{"id": 1, "name": "Springfield", "country": "US"}]"#,
        )
        .unwrap();
        std::fs::write(
            data.path().join("country-codes.csv"),
            "English short name lower case,Alpha-2 code\nUnited States,US\nFrance,FR\n",
        )
        .unwrap();

        Self {
            data,
            images: tempfile::tempdir().unwrap(),
            scraper: Arc::new(scraper),
            uploader: Arc::new(FakeUploader::default()),
            publisher: Arc::new(FakePublisher::default()),
        }
    }

    fn bot(&self, weather_base: &str, max_restarts: u32) -> Bot {
        let catalog = CityCatalog::load(&self.data.path().join("city.list.json")).unwrap();
        let crosswalk =
            CountryCrosswalk::load(&self.data.path().join("country-codes.csv")).unwrap();
        let weather = WeatherProvider::new(
            SecretString::from("test-key".to_string()),
            weather_base,
            RetryConfig::immediate(3),
        )
        .unwrap();

        Bot::new(
            Arc::new(catalog),
            Arc::new(crosswalk),
            weather,
            self.scraper.clone(),
            self.uploader.clone(),
            self.publisher.clone(),
            BotSettings {
                images_root: self.images.path().to_path_buf(),
                interval: Duration::from_secs(60),
                max_restarts,
                once: true,
            },
        )
    }

    fn images_left(&self) -> usize {
        std::fs::read_dir(self.images.path()).unwrap().count()
    }
}

#[tokio::test]
async fn scenario_a_posts_caption_with_four_photos() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("id", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clear_sky()))
        .expect(1)
        .mount(&server)
        .await;

    let fixture = Fixture::new(FakeScraper::new(3, 1));
    let bot = fixture.bot(&server.uri(), 0);

    let outcome = bot.run_iteration(&CancellationToken::new()).await.unwrap();

    let expected =
        "It is 72F in Springfield, United States ☀! With clear sky and 40% humidity, it feels like 70F.";
    assert!(
        matches!(
            outcome,
            IterationOutcome::Posted { ref caption, city_id: 1, ref post_id }
                if caption == expected && post_id.0 == "p1"
        ),
        "expected a post, got {:?}",
        outcome
    );

    let posts = fixture.publisher.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, expected);
    assert_eq!(posts[0].1, vec!["m1", "m2", "m3", "m4"]);

    // Three location photos are uploaded before the weather photo.
    let files = fixture.uploader.files.lock().unwrap();
    let parents: Vec<String> = files
        .iter()
        .map(|f| f.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        parents,
        vec![
            "Springfield United States",
            "Springfield United States",
            "Springfield United States",
            "clear sky"
        ]
    );

    assert_eq!(fixture.images_left(), 0);
}

#[tokio::test]
async fn scenario_b_not_found_is_retried_and_second_response_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cod": "404"})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clear_sky()))
        .with_priority(2)
        .mount(&server)
        .await;

    let fixture = Fixture::new(FakeScraper::new(3, 1));
    let bot = fixture.bot(&server.uri(), 0);

    let outcome = bot.run_iteration(&CancellationToken::new()).await.unwrap();

    assert!(outcome.is_posted());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    let posts = fixture.publisher.posts.lock().unwrap();
    assert!(posts[0].0.starts_with("It is 72F in Springfield, United States"));
}

#[tokio::test]
async fn scenario_c_missing_city_photo_restarts_without_posting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clear_sky()))
        .mount(&server)
        .await;

    let fixture = Fixture::new(FakeScraper::new(2, 1));
    let bot = fixture.bot(&server.uri(), 0);

    let outcome = bot.run_iteration(&CancellationToken::new()).await.unwrap();

    assert!(
        matches!(
            outcome,
            IterationOutcome::Restart {
                stage: Stage::CollectMedia,
                reason: BotError::MediaCountMismatch { expected: 3, found: 2, .. },
            }
        ),
        "expected a restart, got {:?}",
        outcome
    );
    assert!(fixture.publisher.posts.lock().unwrap().is_empty());
    assert!(fixture.uploader.files.lock().unwrap().is_empty());
    assert_eq!(fixture.images_left(), 0);
}

#[tokio::test]
async fn scenario_c_restarts_go_back_to_city_selection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clear_sky()))
        .mount(&server)
        .await;

    let fixture = Fixture::new(FakeScraper::new(2, 1));
    let bot = fixture.bot(&server.uri(), 2);

    let summary = bot.run(&CancellationToken::new()).await.unwrap();

    // Initial attempt plus two restarts, each fetching weather afresh.
    assert_eq!(summary.posts, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(fixture.scraper.queries.lock().unwrap().len(), 6);
    assert!(fixture.publisher.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_country_code_is_fatal() {
    let server = MockServer::start().await;
    let fixture = Fixture::new(FakeScraper::new(3, 1));
    std::fs::write(
        fixture.data.path().join("country-codes.csv"),
        "English short name lower case,Alpha-2 code\nFrance,FR\n",
    )
    .unwrap();
    let bot = fixture.bot(&server.uri(), 0);

    let err = bot.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, BotError::DataLoad(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
