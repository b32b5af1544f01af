//! Offline-first access to restaurants and reviews.
//!
//! Reads go to the network first and are written through to a versioned
//! SQLite store; when the network fails the store answers instead. The
//! collaborator surface is small:
//!
//! - [`SyncCoordinator::fetch`] / [`SyncCoordinator::fetch_reviews`] for reads
//! - [`MutationGateway::toggle_field`] / [`MutationGateway::submit_review`] for writes
//! - [`query`] for filtering and distinct values over a fetched collection
//!
//! ```ignore
//! let config = Config::load(None)?;
//! let sync = SyncCoordinator::new(
//!   HttpRemote::new(&config.remote)?,
//!   LocalStore::new(config.store.clone()),
//! );
//! let restaurants: Vec<Restaurant> = sync.fetch().await;
//! let thai = query::filter_by_field(restaurants, "cuisine_type", "Thai");
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod mutation;
pub mod query;
pub mod remote;

pub use cache::{LocalStore, Record, RecordKind, Source, StoreState, SyncCoordinator, Synced};
pub use config::{Config, RemoteConfig, StoreConfig};
pub use error::{Error, NetworkError, StoreError};
pub use model::{LatLng, NewReview, Restaurant, Review, Timestamp};
pub use mutation::MutationGateway;
pub use remote::{HttpRemote, RemoteSource};
