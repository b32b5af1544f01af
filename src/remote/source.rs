//! The seam between the sync layer and the network.

use serde_json::Value;
use std::future::Future;

use crate::cache::RecordKind;
use crate::error::NetworkError;
use crate::model::NewReview;

/// A remote source of records.
///
/// Implementations return the decoded JSON payload as received; shaping it
/// into typed collections is the sync layer's job. Any non-success status or
/// transport failure must be reported as a [`NetworkError`], never as an
/// empty payload.
pub trait RemoteSource: Send + Sync {
  /// Every record of `kind`.
  fn fetch_collection(
    &self,
    kind: RecordKind,
  ) -> impl Future<Output = Result<Value, NetworkError>> + Send;

  /// Reviews belonging to one restaurant. May be an array or a single object.
  fn fetch_reviews_for_restaurant(
    &self,
    restaurant_id: i64,
  ) -> impl Future<Output = Result<Value, NetworkError>> + Send;

  /// Set a single boolean field; the remote side replies with the full record.
  fn update_field(
    &self,
    kind: RecordKind,
    id: i64,
    field: &str,
    value: bool,
  ) -> impl Future<Output = Result<Value, NetworkError>> + Send;

  /// Create a review; the remote side replies with the stored review.
  fn create_review(
    &self,
    review: &NewReview,
  ) -> impl Future<Output = Result<Value, NetworkError>> + Send;
}
