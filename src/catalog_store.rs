//! Catalog persistence between runs
//!
//! The catalog is stored as JSON with the time of the last successful run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use converge::Catalog;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of the catalog
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCatalog {
    /// Last time a run saved the catalog
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub catalog: Catalog,
}

impl Default for StoredCatalog {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            catalog: Catalog::new(),
        }
    }
}

/// Catalog file location plus load/save
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored catalog, or an empty one if nothing was saved yet
    pub fn load(&self) -> Result<StoredCatalog> {
        if !self.path.exists() {
            log::debug!(
                "Catalog file {} does not exist, starting empty",
                self.path.display()
            );
            return Ok(StoredCatalog::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read catalog: {}", self.path.display()))?;
        let stored: StoredCatalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {}", self.path.display()))?;

        log::debug!("Loaded catalog from {}", self.path.display());
        Ok(stored)
    }

    /// Save a catalog, stamping it with the current time
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let stored = StoredCatalog {
            last_updated: Utc::now(),
            catalog: catalog.clone(),
        };
        let content =
            serde_json::to_string_pretty(&stored).context("Failed to serialize catalog to JSON")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write catalog: {}", self.path.display()))?;

        log::debug!("Saved catalog to {}", self.path.display());
        Ok(())
    }
}
