//! Restaurant and review records as served by the backend.
//!
//! The backend is loose about types: `is_favorite` arrives as a boolean or as
//! the strings `"true"`/`"false"`, and numeric ids may arrive as strings once a
//! record has been round-tripped through a form. Decoding accepts both, and
//! any field not modelled here is kept in `extra` so records survive the
//! local store unchanged.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::cache::{field_from_json, Record, RecordKind};
use crate::error::{Error, Result};

/// Restaurant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  #[serde(deserialize_with = "deserialize_lenient_i64")]
  pub id: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub neighborhood: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photograph: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latlng: Option<LatLng>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cuisine_type: Option<String>,
  #[serde(default, deserialize_with = "deserialize_lenient_bool")]
  pub is_favorite: bool,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

impl Restaurant {
  /// Relative URL of the restaurant's detail page.
  pub fn page_url(&self) -> String {
    format!("./restaurants/{}", self.id)
  }

  /// Relative URL of the restaurant's photograph, falling back to the id
  /// for records without one.
  pub fn image_url(&self) -> String {
    match self.photograph.as_deref() {
      Some(photo) if !photo.is_empty() => format!("/img/{}.jpg", photo),
      _ => format!("/img/{}.jpg", self.id),
    }
  }
}

impl Record for Restaurant {
  const KIND: RecordKind = RecordKind::Restaurant;

  fn id(&self) -> i64 {
    self.id
  }

  fn toggleable_fields() -> &'static [&'static str] {
    &["is_favorite"]
  }

  fn field(&self, name: &str) -> Option<Value> {
    match name {
      "id" => Some(Value::from(self.id)),
      "name" => self.name.as_deref().map(Value::from),
      "neighborhood" => self.neighborhood.as_deref().map(Value::from),
      "cuisine_type" => self.cuisine_type.as_deref().map(Value::from),
      "is_favorite" => Some(Value::from(self.is_favorite)),
      _ => field_from_json(self, name),
    }
  }
}

/// Review record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  #[serde(deserialize_with = "deserialize_lenient_i64")]
  pub id: i64,
  #[serde(deserialize_with = "deserialize_lenient_i64")]
  pub restaurant_id: i64,
  #[serde(default)]
  pub name: String,
  #[serde(default, deserialize_with = "deserialize_lenient_i64")]
  pub rating: i64,
  #[serde(default)]
  pub comments: String,
  #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<Timestamp>,
  #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<Timestamp>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Record for Review {
  const KIND: RecordKind = RecordKind::Review;

  fn id(&self) -> i64 {
    self.id
  }

  fn lookup_key(&self) -> i64 {
    self.restaurant_id
  }

  fn field(&self, name: &str) -> Option<Value> {
    match name {
      "id" => Some(Value::from(self.id)),
      "restaurant_id" => Some(Value::from(self.restaurant_id)),
      "name" => Some(Value::from(self.name.as_str())),
      "rating" => Some(Value::from(self.rating)),
      _ => field_from_json(self, name),
    }
  }
}

/// Creation/update time as sent by the backend: epoch milliseconds from the
/// server, ISO-8601 text from reviews composed on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
  Millis(i64),
  Text(String),
}

impl Timestamp {
  pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
    match self {
      Timestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
      Timestamp::Text(s) => DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok(),
    }
  }
}

/// A review composed locally, not yet accepted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReview {
  pub restaurant_id: i64,
  pub name: String,
  pub rating: i64,
  pub comments: String,
  #[serde(rename = "createdAt")]
  pub created_at: String,
}

impl NewReview {
  pub fn new(
    restaurant_id: i64,
    name: impl Into<String>,
    rating: i64,
    comments: impl Into<String>,
  ) -> Self {
    Self {
      restaurant_id,
      name: name.into(),
      rating,
      comments: comments.into(),
      created_at: Utc::now().to_rfc3339(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.restaurant_id <= 0 {
      return Err(Error::validation(format!(
        "invalid restaurant id {}",
        self.restaurant_id
      )));
    }
    if self.name.trim().is_empty() {
      return Err(Error::validation("review name is empty"));
    }
    if !(1..=5).contains(&self.rating) {
      return Err(Error::validation(format!(
        "rating {} is outside 1..=5",
        self.rating
      )));
    }
    if self.comments.trim().is_empty() {
      return Err(Error::validation("review comments are empty"));
    }
    Ok(())
  }
}

// ============================================================================
// Lenient decoding
// ============================================================================

fn deserialize_lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  struct BoolVisitor;

  impl<'de> de::Visitor<'de> for BoolVisitor {
    type Value = bool;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
      formatter.write_str("a boolean or string 'true'/'false'")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Self::Value, E> {
      Ok(v)
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
    where
      E: de::Error,
    {
      match v.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        other => Err(E::custom(format!("invalid boolean string '{}'", other))),
      }
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E> {
      Ok(v != 0)
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E> {
      Ok(v != 0)
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
      Ok(false)
    }

    fn visit_none<E>(self) -> std::result::Result<Self::Value, E> {
      Ok(false)
    }
  }

  deserializer.deserialize_any(BoolVisitor)
}

fn deserialize_lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
  D: Deserializer<'de>,
{
  struct IntVisitor;

  impl<'de> de::Visitor<'de> for IntVisitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
      formatter.write_str("an integer or numeric string")
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E> {
      Ok(v)
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
    where
      E: de::Error,
    {
      i64::try_from(v).map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E>
    where
      E: de::Error,
    {
      if v.fract() == 0.0 && v.is_finite() {
        Ok(v as i64)
      } else {
        Err(E::custom(format!("expected an integer, got {}", v)))
      }
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
    where
      E: de::Error,
    {
      v.trim()
        .parse()
        .map_err(|_| E::custom(format!("invalid integer string '{}'", v)))
    }
  }

  deserializer.deserialize_any(IntVisitor)
}
