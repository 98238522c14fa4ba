use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::debug;

use super::{
    CatalogRepository, CatalogValidationError, ReasonCatalog, ReasonCode, ReasonEntry,
    SuspicionLevel,
};

/// Loads reason overrides from a JSON5 file and layers them over the built-in tables.
///
/// A missing file is not an error: the built-in catalog is served unchanged.
pub struct FileCatalogRepository {
    path: PathBuf,
    cache: OnceCell<ReasonCatalog>,
}

impl FileCatalogRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    fn load_overrides(&self) -> Result<Vec<ReasonEntry>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "catalog file absent; using built-in tables");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).with_context(|| {
            format!("failed to read reason catalog at {}", self.path.display())
        })?;
        let items: Vec<FileEntry> = json5::from_str(&raw).with_context(|| {
            format!(
                "invalid structure in reason catalog at {}",
                self.path.display()
            )
        })?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let reason = ReasonCode::from(item.reason);
            if !seen.insert(reason.clone()) {
                return Err(CatalogValidationError::DuplicateReason {
                    reason: reason.to_string(),
                })
                .with_context(|| format!("invalid entry in {}", self.path.display()));
            }
            let entry = ReasonEntry::new(reason, item.suspicion_level, item.behavior_message)
                .with_context(|| format!("invalid entry in {}", self.path.display()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn build(&self) -> Result<ReasonCatalog> {
        let mut catalog = ReasonCatalog::builtin();
        let overrides = self.load_overrides()?;
        debug!(overrides = overrides.len(), "merging reason overrides");
        for entry in overrides {
            catalog.upsert(entry)?;
        }
        Ok(catalog)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for FileCatalogRepository {
    async fn load_catalog(&self) -> Result<ReasonCatalog> {
        let catalog = self.cache.get_or_try_init(|| self.build())?;
        Ok(catalog.clone())
    }
}

#[derive(serde::Deserialize)]
struct FileEntry {
    reason: String,
    suspicion_level: SuspicionLevel,
    behavior_message: String,
}
