//! Last known release, cached on disk between runs

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CliError;
use crate::filesys::file::File;

/// How long a cached release is trusted
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCache {
    pub latest_version: String,
    pub checked_at: DateTime<Utc>,
}

impl VersionCache {
    pub fn new(latest_version: impl Into<String>) -> Self {
        Self {
            latest_version: latest_version.into(),
            checked_at: Utc::now(),
        }
    }

    /// Read the cache. A missing or unreadable file is no cache.
    pub async fn load(file: &File) -> Option<Self> {
        if !file.exists().await {
            return None;
        }
        match file.read_json::<Self>().await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::debug!("ignoring unreadable version cache: {}", e);
                None
            }
        }
    }

    pub async fn save(&self, file: &File) -> Result<(), CliError> {
        file.write_json(self).await
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match (now - self.checked_at).to_std() {
            Ok(age) => age < CACHE_TTL,
            // checked in the future, clock moved
            Err(_) => false,
        }
    }
}
