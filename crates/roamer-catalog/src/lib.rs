//! Static reference data for the bot.
//!
//! Loads the city catalog and the country-code crosswalk once at startup and
//! picks cities from the catalog.

pub mod city;
pub mod crosswalk;
pub mod error;

pub use city::{CityCatalog, CityRecord};
pub use crosswalk::CountryCrosswalk;
pub use error::CatalogError;
