//! Feed synchronization.
//!
//! `SyncEngine` drives pagination against a `PageFetcher`, reconciles each
//! page into the `ProfileStore`, schedules avatar downloads, and routes local
//! decisions either straight to `StatusSync` or into the `ActionQueue` for
//! replay when connectivity returns.
//!
//! - `cursor`: pagination and fetch-state
//! - `engine`: the engine itself and its degraded-mode `Notice`

pub mod cursor;
pub mod engine;

pub use cursor::SyncCursor;
pub use engine::{Notice, SyncEngine};
