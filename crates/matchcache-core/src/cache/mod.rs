//! Local caching module for offline data access.
//!
//! This module provides the three local components the sync engine works
//! against:
//!
//! - `ProfileStore`: deduplicated, durable store of cached profiles
//! - `ActionQueue`: decisions made while offline, awaiting replay
//! - `AssetCache`: fetch-once avatar images keyed by identity
//!
//! Collections are persisted as JSON wrapped in a `CachedData` envelope that
//! records when they were written.

pub mod assets;
pub mod persist;
pub mod queue;
pub mod store;

pub use assets::{AssetCache, AssetError};
pub use persist::{age_display, CachedData};
pub use queue::ActionQueue;
pub use store::{ProfileStore, UpsertOutcome};
