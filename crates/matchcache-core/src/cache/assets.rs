use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use crate::api::{AssetSource, FetchError};
use crate::models::ProfileId;

use super::persist::temp_path;

/// File extension for cached avatars
const ASSET_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Download failed: {0}")]
    Download(#[from] FetchError),

    #[error("Failed to store asset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid asset URL: {0}")]
    InvalidUrl(String),

    #[error("Download already in progress for {0}")]
    InFlight(ProfileId),
}

/// Fetch-once avatar cache, one file per identity.
///
/// A file that exists is complete: downloads are written to a temp file and
/// renamed into place. Concurrent requests for the same identity are absorbed
/// by the in-flight set, so at most one download per identity runs at a time.
pub struct AssetCache {
    dir: PathBuf,
    source: Arc<dyn AssetSource>,
    in_flight: Mutex<HashSet<ProfileId>>,
}

/// Releases an in-flight claim when the download finishes or is dropped.
struct InFlightClaim<'a> {
    cache: &'a AssetCache,
    id: ProfileId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.cache.lock_in_flight().remove(&self.id);
    }
}

impl AssetCache {
    pub fn new(dir: PathBuf, source: Arc<dyn AssetSource>) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            source,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<ProfileId>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn asset_path(&self, id: ProfileId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, ASSET_EXTENSION))
    }

    /// Path of the cached asset for `id`, if it has been downloaded.
    pub fn local_path(&self, id: ProfileId) -> Option<PathBuf> {
        let path = self.asset_path(id);
        path.is_file().then_some(path)
    }

    fn claim(&self, id: ProfileId) -> Option<InFlightClaim<'_>> {
        if self.lock_in_flight().insert(id) {
            Some(InFlightClaim { cache: self, id })
        } else {
            None
        }
    }

    /// Download `url` and store it as the asset for `id`, returning the local
    /// path. An already cached asset is returned without downloading.
    pub async fn fetch(&self, id: ProfileId, url: &str) -> Result<PathBuf, AssetError> {
        if let Some(path) = self.local_path(id) {
            return Ok(path);
        }

        reqwest::Url::parse(url).map_err(|_| AssetError::InvalidUrl(url.to_string()))?;

        let Some(_claim) = self.claim(id) else {
            return Err(AssetError::InFlight(id));
        };

        // A download may have landed between the first check and the claim
        if let Some(path) = self.local_path(id) {
            return Ok(path);
        }

        let bytes = self.source.download(url).await?;

        let path = self.asset_path(id);
        store_atomically(&path, &bytes).await?;

        debug!(%id, bytes = bytes.len(), path = %path.display(), "Asset cached");
        Ok(path)
    }

    /// Remove the cached asset for `id`. Returns whether a file was deleted.
    pub fn remove(&self, id: ProfileId) -> Result<bool> {
        match self.local_path(id) {
            Some(path) => {
                std::fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Write `bytes` to a temp sibling and rename it onto `path`. The temp file
/// never outlives a failed attempt.
async fn store_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);
    let result = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

// ============================================================================
// Tests
// ============================================================================
