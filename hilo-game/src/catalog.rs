//! Static content catalog: the immutable pool of comparable items.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::CatalogLoader;
use crate::constants::MIN_CATALOG_SIZE;

/// A comparable item with a fixed popularity metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    /// Popularity metric (page views).
    #[serde(alias = "views")]
    pub metric: u64,
    /// Opaque image handle; the renderer decides how to resolve it.
    #[serde(alias = "imageUrl", default)]
    pub image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kym_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_image_url: Option<String>,
}

impl Item {
    /// Minimal item used by tests and synthetic catalogs.
    #[must_use]
    pub fn new(id: &str, name: &str, metric: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            metric,
            image_ref: String::new(),
            description: None,
            kym_url: None,
            year: None,
            category: None,
            fallback_image_url: None,
        }
    }
}

/// Raw catalog document as produced by the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CatalogData {
    #[serde(default)]
    pub memes: Vec<Item>,
}

impl CatalogData {
    /// Parse a catalog document from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the catalog schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Startup failures for the catalog. All of them are fatal.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog needs at least {min} items (got {found})")]
    TooFewItems { min: usize, found: usize },
    #[error("duplicate item id `{0}` in catalog")]
    DuplicateId(String),
    #[error("catalog JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog file unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Validated, immutable item pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    /// Validate and wrap a list of items.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when fewer than two items are supplied or an id repeats.
    pub fn new(items: Vec<Item>) -> Result<Self, CatalogError> {
        if items.len() < MIN_CATALOG_SIZE {
            return Err(CatalogError::TooFewItems {
                min: MIN_CATALOG_SIZE,
                found: items.len(),
            });
        }
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(CatalogError::DuplicateId(item.id.clone()));
            }
        }
        Ok(Self { items })
    }

    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for malformed JSON or an invalid item pool.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data = CatalogData::from_json(json)?;
        Self::from_data(data)
    }

    /// Validate an already parsed document.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for an invalid item pool.
    pub fn from_data(data: CatalogData) -> Result<Self, CatalogError> {
        Self::new(data.memes)
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a validated catalog; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Highest attainable streak, which bounds every legitimate leaderboard score.
    #[must_use]
    pub fn max_score(&self) -> u32 {
        crate::numbers::len_to_u32(self.items.len())
    }
}

/// Loads the catalog from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogLoader for JsonFileCatalog {
    type Error = CatalogError;

    fn load_catalog(&self) -> Result<CatalogData, Self::Error> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(CatalogData::from_json(&raw)?)
    }
}

/// Catalog compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedCatalog(pub &'static str);

impl EmbeddedCatalog {
    /// The sample catalog shipped with the crate.
    #[must_use]
    pub const fn sample() -> Self {
        Self(include_str!("../assets/memes.json"))
    }
}

impl CatalogLoader for EmbeddedCatalog {
    type Error = serde_json::Error;

    fn load_catalog(&self) -> Result<CatalogData, Self::Error> {
        CatalogData::from_json(self.0)
    }
}
