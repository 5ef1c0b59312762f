//! Remote directory access.
//!
//! This module defines the capabilities the sync engine consumes from the
//! outside world and provides `ApiClient`, the HTTP implementation of all of
//! them:
//!
//! - `PageFetcher`: paginated profile fetch (`page` starts at 1, an empty
//!   page means there are no more)
//! - `StatusSync`: best-effort delivery of a local decision
//! - `AssetSource`: raw download of an avatar image

pub mod client;
pub mod error;
pub mod traits;

pub use client::ApiClient;
pub use error::FetchError;
pub use traits::{AssetSource, PageFetcher, StatusSync};
