mod snapshot;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::features::ProfileStats;

pub use snapshot::SnapshotProfileSource;

/// Source of public profile statistics, keyed by normalized username.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Look up a profile; `Ok(None)` means the account does not exist.
    async fn fetch(&self, username: &str) -> Result<Option<ProfileStats>>;
}

/// In-memory profile table.
#[derive(Debug, Default, Clone)]
pub struct StaticProfileSource {
    profiles: HashMap<String, ProfileStats>,
}

impl StaticProfileSource {
    pub fn new(profiles: impl IntoIterator<Item = ProfileStats>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.username.clone(), profile))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    async fn fetch(&self, username: &str) -> Result<Option<ProfileStats>> {
        Ok(self.profiles.get(username).cloned())
    }
}
