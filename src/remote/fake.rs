//! In-memory remote for tests, with failure injection and call recording.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::cache::RecordKind;
use crate::error::NetworkError;
use crate::model::NewReview;

use super::source::RemoteSource;

pub struct FakeRemote {
  online: AtomicBool,
  restaurants: Mutex<Value>,
  reviews: Mutex<HashMap<i64, Value>>,
  update_reply: Mutex<Option<Value>>,
  calls: Mutex<Vec<String>>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self {
      online: AtomicBool::new(true),
      restaurants: Mutex::new(json!([])),
      reviews: Mutex::new(HashMap::new()),
      update_reply: Mutex::new(None),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn offline() -> Self {
    let fake = Self::new();
    fake.set_online(false);
    fake
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  pub fn with_restaurants(self, payload: Value) -> Self {
    self.set_restaurants(payload);
    self
  }

  pub fn set_restaurants(&self, payload: Value) {
    *self.restaurants.lock().unwrap() = payload;
  }

  pub fn with_reviews(self, restaurant_id: i64, payload: Value) -> Self {
    self.reviews.lock().unwrap().insert(restaurant_id, payload);
    self
  }

  /// Reply to the next update with `payload` instead of echoing.
  pub fn reply_to_update(&self, payload: Value) {
    *self.update_reply.lock().unwrap() = Some(payload);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  fn record(&self, call: String) -> Result<(), NetworkError> {
    self.calls.lock().unwrap().push(call);
    if self.online.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(NetworkError::Status {
        url: "fake://offline".to_string(),
        status: 503,
        body: "offline".to_string(),
      })
    }
  }
}

impl RemoteSource for FakeRemote {
  async fn fetch_collection(&self, kind: RecordKind) -> Result<Value, NetworkError> {
    self.record(format!("GET {kind}"))?;
    match kind {
      RecordKind::Restaurant => Ok(self.restaurants.lock().unwrap().clone()),
      RecordKind::Review => {
        let all: Vec<Value> = self
          .reviews
          .lock()
          .unwrap()
          .values()
          .flat_map(|v| match v {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
          })
          .collect();
        Ok(Value::Array(all))
      }
    }
  }

  async fn fetch_reviews_for_restaurant(&self, restaurant_id: i64) -> Result<Value, NetworkError> {
    self.record(format!("GET reviews?restaurant_id={restaurant_id}"))?;
    Ok(
      self
        .reviews
        .lock()
        .unwrap()
        .get(&restaurant_id)
        .cloned()
        .unwrap_or_else(|| json!([])),
    )
  }

  async fn update_field(
    &self,
    kind: RecordKind,
    id: i64,
    field: &str,
    value: bool,
  ) -> Result<Value, NetworkError> {
    self.record(format!("PUT {kind}/{id}?{field}={value}"))?;
    if let Some(reply) = self.update_reply.lock().unwrap().take() {
      return Ok(reply);
    }
    Ok(json!({ "id": id, field: value }))
  }

  async fn create_review(&self, review: &NewReview) -> Result<Value, NetworkError> {
    self.record(format!("POST review restaurant_id={}", review.restaurant_id))?;
    let mut created = serde_json::to_value(review)?;
    created["id"] = json!(1000);
    Ok(created)
  }
}
