//! Sync coordinator: network-first reads with local fallback.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::LocalStore;
use super::traits::{Record, Synced};
use crate::error::NetworkError;
use crate::model::{Restaurant, Review};
use crate::query;
use crate::remote::RemoteSource;

/// Which stored records a failed network read falls back to.
#[derive(Debug, Clone, Copy)]
enum Scope {
  All,
  Lookup(i64),
}

/// Coordinates the remote source and the local store.
///
/// Reads try the network first. A successful result is written through to
/// the store before it is returned; a failed one is answered from the store.
/// Reads never fail: with both tiers down the result is an empty collection.
pub struct SyncCoordinator<N: RemoteSource> {
  remote: Arc<N>,
  store: Arc<LocalStore>,
}

impl<N: RemoteSource> SyncCoordinator<N> {
  pub fn new(remote: N, store: LocalStore) -> Self {
    Self::from_shared(Arc::new(remote), Arc::new(store))
  }

  pub fn from_shared(remote: Arc<N>, store: Arc<LocalStore>) -> Self {
    Self { remote, store }
  }

  pub fn remote(&self) -> &Arc<N> {
    &self.remote
  }

  pub fn store(&self) -> &Arc<LocalStore> {
    &self.store
  }

  /// Every record of kind `T`.
  pub async fn fetch<T: Record>(&self) -> Vec<T> {
    self.fetch_with_source().await.data
  }

  /// Every record of kind `T`, with the tier that served it.
  pub async fn fetch_with_source<T: Record>(&self) -> Synced<Vec<T>> {
    let fetched = self.remote.fetch_collection(T::KIND).await.and_then(normalize::<T>);
    self.settle(fetched, Scope::All).await
  }

  /// Reviews for one restaurant.
  pub async fn fetch_reviews(&self, restaurant_id: i64) -> Vec<Review> {
    self.fetch_reviews_with_source(restaurant_id).await.data
  }

  /// Reviews for one restaurant, with the tier that served them. The
  /// fallback reads only that restaurant's reviews.
  pub async fn fetch_reviews_with_source(&self, restaurant_id: i64) -> Synced<Vec<Review>> {
    let fetched = self
      .remote
      .fetch_reviews_for_restaurant(restaurant_id)
      .await
      .and_then(normalize::<Review>);
    self.settle(fetched, Scope::Lookup(restaurant_id)).await
  }

  async fn settle<T: Record>(
    &self,
    fetched: Result<Vec<T>, NetworkError>,
    scope: Scope,
  ) -> Synced<Vec<T>> {
    match fetched {
      Ok(records) => {
        // Completes before returning so a later fallback sees these records.
        if let Err(e) = self.store.put_all(&records).await {
          warn!(kind = %T::KIND, error = %e, "Write-through failed, returning network data only");
        }
        debug!(kind = %T::KIND, count = records.len(), "Fetched from network");
        Synced::from_network(records)
      }
      Err(network) => {
        warn!(kind = %T::KIND, error = %network, "Network fetch failed, falling back to local store");
        let stored = match scope {
          Scope::All => self.store.get_all::<T>().await,
          Scope::Lookup(key) => self.store.get_by_lookup_key::<T>(key).await,
        };
        match stored {
          Ok(records) => {
            debug!(kind = %T::KIND, count = records.len(), "Served from local store");
            Synced::from_store(records)
          }
          Err(e) => {
            warn!(kind = %T::KIND, error = %e, "Local store unavailable, returning empty collection");
            Synced::unavailable(Vec::new())
          }
        }
      }
    }
  }

  // ===== Composed restaurant queries =====

  pub async fn restaurant_by_id(&self, id: i64) -> Option<Restaurant> {
    self
      .fetch::<Restaurant>()
      .await
      .into_iter()
      .find(|r| r.id == id)
  }

  /// A restaurant together with its reviews, fetched concurrently.
  pub async fn restaurant_detail(&self, id: i64) -> Option<(Restaurant, Vec<Review>)> {
    let (restaurant, reviews) = futures::join!(self.restaurant_by_id(id), self.fetch_reviews(id));
    restaurant.map(|r| (r, reviews))
  }

  pub async fn restaurants_by_cuisine(&self, cuisine: &str) -> Vec<Restaurant> {
    query::filter_by_field(self.fetch().await, "cuisine_type", cuisine)
  }

  pub async fn restaurants_by_neighborhood(&self, neighborhood: &str) -> Vec<Restaurant> {
    query::filter_by_field(self.fetch().await, "neighborhood", neighborhood)
  }

  pub async fn restaurants_by_cuisine_and_neighborhood(
    &self,
    cuisine: &str,
    neighborhood: &str,
  ) -> Vec<Restaurant> {
    query::filter_by_cuisine_and_neighborhood(self.fetch().await, cuisine, neighborhood)
  }

  pub async fn cuisines(&self) -> Vec<String> {
    query::distinct_values(&self.fetch::<Restaurant>().await, "cuisine_type")
  }

  pub async fn neighborhoods(&self) -> Vec<String> {
    query::distinct_values(&self.fetch::<Restaurant>().await, "neighborhood")
  }
}

impl<N: RemoteSource> Clone for SyncCoordinator<N> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      store: Arc::clone(&self.store),
    }
  }
}

/// Shape a payload into a collection: an array maps element-wise, a single
/// object becomes a one-element collection.
pub fn normalize<T: Record>(payload: Value) -> Result<Vec<T>, NetworkError> {
  match payload {
    Value::Array(items) => items
      .into_iter()
      .map(|item| serde_json::from_value(item).map_err(NetworkError::from))
      .collect(),
    obj @ Value::Object(_) => Ok(vec![serde_json::from_value(obj)?]),
    other => Err(NetworkError::Decode(format!(
      "expected {} record(s), got {}",
      T::KIND,
      json_type(&other)
    ))),
  }
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
