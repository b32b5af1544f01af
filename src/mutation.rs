//! Mutation gateway: confirmed single-record writes.
//!
//! Nothing is changed locally until the remote side confirms it. Every
//! failure before confirmation is returned to the caller, who must then leave
//! the displayed state untouched.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{normalize, LocalStore, Record, SyncCoordinator};
use crate::error::{Error, NetworkError, Result};
use crate::model::{NewReview, Restaurant, Review};
use crate::remote::RemoteSource;

pub struct MutationGateway<N: RemoteSource> {
  remote: Arc<N>,
  store: Arc<LocalStore>,
}

impl<N: RemoteSource> MutationGateway<N> {
  pub fn new(remote: Arc<N>, store: Arc<LocalStore>) -> Self {
    Self { remote, store }
  }

  /// Flip a boolean field on record `id`, currently `current`.
  ///
  /// Returns the record as confirmed by the remote side, after writing it to
  /// the local store.
  pub async fn toggle_field<T: Record>(&self, id: i64, field: &str, current: bool) -> Result<T> {
    if !T::toggleable_fields().iter().any(|f| *f == field) {
      return Err(Error::validation(format!(
        "field '{}' cannot be toggled on a {}",
        field,
        T::KIND
      )));
    }

    let next = !current;
    let payload = self.remote.update_field(T::KIND, id, field, next).await?;
    let record: T = serde_json::from_value(payload).map_err(NetworkError::from)?;

    if record.id() != id {
      return Err(
        NetworkError::Decode(format!(
          "update of {} {} answered with id {}",
          T::KIND,
          id,
          record.id()
        ))
        .into(),
      );
    }

    self.write_confirmed(&record).await;
    info!(kind = %T::KIND, id, field, value = next, "Field updated");
    Ok(record)
  }

  pub async fn toggle_favorite(&self, restaurant: &Restaurant) -> Result<Restaurant> {
    self
      .toggle_field(restaurant.id, "is_favorite", restaurant.is_favorite)
      .await
  }

  /// Validate and submit a new review, then cache the stored version.
  pub async fn submit_review(&self, review: &NewReview) -> Result<Review> {
    review.validate()?;

    let payload = self.remote.create_review(review).await?;
    let created = normalize::<Review>(payload)?
      .into_iter()
      .next()
      .ok_or_else(|| NetworkError::Decode("review creation returned no record".to_string()))?;

    self.write_confirmed(&created).await;
    info!(id = created.id, restaurant_id = created.restaurant_id, "Review submitted");
    Ok(created)
  }

  /// Cache a record the remote side has already accepted. The remote write
  /// stands even if this fails, so the failure is only logged.
  async fn write_confirmed<T: Record>(&self, record: &T) {
    if let Err(e) = self.store.put(record).await {
      warn!(kind = %T::KIND, id = record.id(), error = %e, "Confirmed record not cached");
    }
  }
}

impl<N: RemoteSource> Clone for MutationGateway<N> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      store: Arc::clone(&self.store),
    }
  }
}

impl<N: RemoteSource> SyncCoordinator<N> {
  /// A mutation gateway sharing this coordinator's remote and store.
  pub fn mutations(&self) -> MutationGateway<N> {
    MutationGateway::new(Arc::clone(self.remote()), Arc::clone(self.store()))
  }

  /// Flip the favorite flag of restaurant `id`.
  ///
  /// The current value is read network first, so a stale cached copy cannot
  /// turn the toggle into a write of the value the backend already holds.
  /// `None` when neither tier knows the restaurant.
  pub async fn toggle_favorite_by_id(&self, id: i64) -> Result<Option<Restaurant>> {
    match self.restaurant_by_id(id).await {
      Some(current) => self.mutations().toggle_favorite(&current).await.map(Some),
      None => Ok(None),
    }
  }
}
