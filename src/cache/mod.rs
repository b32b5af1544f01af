//! Dual-tier caching layer for offline support.
//!
//! This module provides:
//! - A versioned SQLite store with one table per record kind
//! - Network-first reads with write-through to the store
//! - Fallback to stored records when the network is unavailable

mod layer;
pub mod schema;
mod storage;
mod traits;

pub use layer::{normalize, SyncCoordinator};
pub use storage::{LocalStore, StoreState};
pub(crate) use traits::field_from_json;
pub use traits::{Record, RecordKind, Source, Synced};
