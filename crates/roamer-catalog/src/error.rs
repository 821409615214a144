//! Reference data errors.

use std::path::PathBuf;

use roamer_core::BotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed city catalog {path}: {message}")]
    MalformedCatalog { path: PathBuf, message: String },

    #[error("Malformed country crosswalk {path}: {message}")]
    MalformedCrosswalk { path: PathBuf, message: String },

    #[error("City catalog is empty")]
    EmptyCatalog,

    #[error("No country name for code '{0}'")]
    UnknownCountry(String),
}

impl From<CatalogError> for BotError {
    fn from(err: CatalogError) -> Self {
        BotError::DataLoad(err.to_string())
    }
}
