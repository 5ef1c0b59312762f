//! Capability traits consumed by the sync engine.
//!
//! The engine only sees these seams, so tests and alternate transports can
//! stand in for `ApiClient`.

use async_trait::async_trait;
use crate::models::{Decision, ProfileId, RemoteRecord};

use super::FetchError;

/// Paginated fetch of profile records.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page. `page` starts at 1. An empty `Ok` is the only
    /// "no more pages" signal.
    async fn fetch(&self, page: u32, page_size: u32) -> Result<Vec<RemoteRecord>, FetchError>;
}

/// Best-effort delivery of a local decision to the remote side.
#[async_trait]
pub trait StatusSync: Send + Sync {
    async fn notify(&self, id: ProfileId, decision: Decision) -> Result<(), FetchError>;
}

/// Raw download of a binary asset.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
