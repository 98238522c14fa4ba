use std::{io::ErrorKind, path::PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::ProfileSource;
use crate::features::ProfileStats;

/// Reads `<dir>/<username>.json` profile snapshots captured ahead of time.
#[derive(Debug, Clone)]
pub struct SnapshotProfileSource {
    base_path: PathBuf,
}

impl SnapshotProfileSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn snapshot_path(&self, username: &str) -> PathBuf {
        self.base_path.join(format!("{username}.json"))
    }
}

#[async_trait]
impl ProfileSource for SnapshotProfileSource {
    #[instrument(name = "fetch_snapshot", skip(self))]
    async fn fetch(&self, username: &str) -> Result<Option<ProfileStats>> {
        let path = self.snapshot_path(username);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot for profile");
                return Ok(None);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read profile snapshot {}", path.display()))
            }
        };
        let profile: ProfileStats = serde_json::from_str(&raw)
            .with_context(|| format!("invalid profile snapshot {}", path.display()))?;
        Ok(Some(profile))
    }
}
