use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use crate::error::CatalogError;

/// One entry of the city catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CityRecord {
    /// Weather provider city id
    pub id: u64,

    /// Catalog name; the weather provider's display name is used in captions
    #[serde(default)]
    pub name: String,

    /// ISO 3166 alpha-2 code
    #[serde(rename = "country")]
    pub country_code: String,
}

impl CityRecord {
    fn has_valid_country_code(&self) -> bool {
        self.country_code.len() == 2 && self.country_code.chars().all(|c| c.is_ascii_alphabetic())
    }
}

/// Read-only list of cities, loaded once per process.
#[derive(Debug, Clone)]
pub struct CityCatalog {
    cities: Vec<CityRecord>,
}

impl CityCatalog {
    /// Load the catalog from a JSON array of city objects.
    ///
    /// Rows whose country code is not two letters are skipped with a warning.
    ///
    /// # Errors
    /// Returns an error if the file is missing, is not a JSON array of
    /// objects with `id` and `country`, or has no usable rows.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let rows: Vec<CityRecord> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                CatalogError::MalformedCatalog {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;

        let total = rows.len();
        let catalog = Self::from_records(rows)?;

        let skipped = total - catalog.len();
        if skipped > 0 {
            tracing::warn!(
                "Skipped {} catalog rows without a two-letter country code",
                skipped
            );
        }

        tracing::info!("Loaded {} cities from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Build a catalog from records already in memory.
    ///
    /// # Errors
    /// Returns `EmptyCatalog` if no record has a valid country code.
    pub fn from_records(records: Vec<CityRecord>) -> Result<Self, CatalogError> {
        let cities: Vec<CityRecord> = records
            .into_iter()
            .filter(CityRecord::has_valid_country_code)
            .map(|mut city| {
                city.country_code.make_ascii_uppercase();
                city
            })
            .collect();

        if cities.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }

        Ok(Self { cities })
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn cities(&self) -> &[CityRecord] {
        &self.cities
    }

    /// Uniform random pick over the whole catalog. Repeats are allowed.
    pub fn pick_random(&self) -> &CityRecord {
        self.pick_random_with(&mut rand::thread_rng())
    }

    pub fn pick_random_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &CityRecord {
        // The constructor guarantees at least one city.
        match self.cities.choose(rng) {
            Some(city) => city,
            None => &self.cities[0],
        }
    }
}
