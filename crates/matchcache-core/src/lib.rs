//! Offline-tolerant profile feed cache.
//!
//! Pages of profiles are fetched from a remote directory, deduplicated into a
//! durable local store and served from there when the network is unavailable.
//! Accept/decline decisions made offline are queued and replayed once
//! connectivity returns; avatar images are downloaded once per profile.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod sync;

pub use api::{ApiClient, FetchError, PageFetcher, StatusSync};
pub use cache::{ActionQueue, AssetCache, ProfileStore};
pub use config::Config;
pub use models::{CachedProfile, Decision, DecisionStatus, PendingAction, ProfileId};
pub use sync::{Notice, SyncEngine};
