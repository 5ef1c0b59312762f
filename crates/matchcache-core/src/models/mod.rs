//! Data models for profile feed entities.
//!
//! This module contains the data structures shared by the fetch, store and
//! sync layers:
//!
//! - `ProfileId`: opaque identity token, stable across pages and restarts
//! - `RemoteRecord`: one profile as returned by a page fetch
//! - `CachedProfile`: the persisted, deduplicated local copy
//! - `DecisionStatus`, `Decision`, `PendingAction`: local decisions and the
//!   offline replay queue entries
//! - `remote`: wire types of the remote directory

pub mod profile;
pub mod remote;

pub use profile::{
    CachedProfile, Decision, DecisionStatus, PendingAction, ProfileFields, ProfileId, RemoteRecord,
};
pub use remote::{DirectoryResponse, DirectoryUser};
