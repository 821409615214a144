use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use roamer_bot::{Bot, BotSettings};
use roamer_catalog::{CityCatalog, CountryCrosswalk};
use roamer_core::{Config, MediaUploader, Publisher};
use roamer_media::HttpImageScraper;
use roamer_social::{DryRunPublisher, DryRunUploader, TwitterClient};
use roamer_weather::WeatherProvider;
use tokio_util::sync::CancellationToken;

/// Posts the current weather of a random city, with photos.
///
/// Secrets are read from `ROAMER_*` environment variables, e.g.
/// `ROAMER_WEATHER__API_KEY` and `ROAMER_TWITTER__CONSUMER_KEY`.
#[derive(Parser, Debug)]
#[command(name = "roamer", version, about)]
struct Cli {
    /// Optional TOML file layered under the environment
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Make a single post and exit
    #[arg(long)]
    once: bool,

    /// Minutes between posts
    #[arg(long, value_name = "MINUTES")]
    interval: Option<u64>,

    /// Scrape and compose, but log the post instead of uploading and publishing
    #[arg(long)]
    dry_run: bool,

    /// City catalog (JSON)
    #[arg(long, value_name = "PATH")]
    cities: Option<PathBuf>,

    /// Country code crosswalk (CSV)
    #[arg(long, value_name = "PATH")]
    countries: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(minutes) = self.interval {
            config.schedule.interval_minutes = minutes;
        }
        if let Some(path) = &self.cities {
            config.data.cities_path = path.clone();
        }
        if let Some(path) = &self.countries {
            config.data.countries_path = path.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = roamer_core::init() {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }
    if !validation.is_valid() {
        bail!("Invalid configuration: {}", validation.error_summary());
    }

    let catalog = CityCatalog::load(&config.data.cities_path)?;
    let crosswalk = CountryCrosswalk::load(&config.data.countries_path)?;
    tracing::info!(
        cities = catalog.len(),
        countries = crosswalk.len(),
        "Reference data loaded"
    );

    let weather = WeatherProvider::from_config(&config.weather, config.schedule.retry())?;
    let scraper = HttpImageScraper::from_config(&config.images)?;

    let uploader: Arc<dyn MediaUploader>;
    let publisher: Arc<dyn Publisher>;
    if cli.dry_run {
        tracing::info!("Dry run: posts will be logged, not published");
        uploader = Arc::new(DryRunUploader::new());
        publisher = Arc::new(DryRunPublisher::new());
    } else {
        let client = Arc::new(TwitterClient::from_config(&config.twitter)?);
        client.verify_credentials().await?;
        uploader = client.clone();
        publisher = client;
    }

    let bot = Bot::new(
        Arc::new(catalog),
        Arc::new(crosswalk),
        weather,
        Arc::new(scraper),
        uploader,
        publisher,
        BotSettings::from_config(&config, cli.once),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    let summary = bot.run(&cancel).await?;
    tracing::info!(
        posts = summary.posts,
        skipped = summary.skipped,
        restarts = summary.restarts,
        "Roamer stopped"
    );

    if cli.once && summary.posts == 0 && !cancel.is_cancelled() {
        tracing::error!("No post was made");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
