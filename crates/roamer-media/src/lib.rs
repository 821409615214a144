//! Photo scraping and upload for a post.
//!
//! Each iteration scrapes into its own temporary directory, checks that the
//! expected number of photos arrived, and uploads them in a fixed order.

pub mod collector;
pub mod error;
pub mod scraper;
pub mod workspace;

pub use collector::{MediaCollector, LOCATION_PHOTO_COUNT, WEATHER_PHOTO_COUNT};
pub use error::MediaError;
pub use scraper::{HttpImageScraper, ImageScraper};
pub use workspace::{cleanup, IterationWorkspace};
