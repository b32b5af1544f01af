//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

/// The kinds of record the cache knows how to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
  Restaurant,
  Review,
}

impl RecordKind {
  /// SQLite table backing this kind.
  pub fn table(self) -> &'static str {
    match self {
      RecordKind::Restaurant => "restaurant_store",
      RecordKind::Review => "review_store",
    }
  }

  /// Column carrying the secondary index for this kind.
  pub fn lookup_column(self) -> &'static str {
    match self {
      RecordKind::Restaurant => "id",
      RecordKind::Review => "restaurant_id",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      RecordKind::Restaurant => "restaurant",
      RecordKind::Review => "review",
    }
  }
}

impl fmt::Display for RecordKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Trait for records that can be cached.
///
/// A record is a snapshot of a remote object: it is identified by an integer
/// id unique within its kind, and exposes its fields by name so that the
/// query functions can work on any kind.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Which table this record lives in.
  const KIND: RecordKind;

  /// Primary key.
  fn id(&self) -> i64;

  /// Value of the secondary index column. Defaults to the primary key.
  fn lookup_key(&self) -> i64 {
    self.id()
  }

  /// Boolean fields the remote side accepts single-field updates for.
  fn toggleable_fields() -> &'static [&'static str] {
    &[]
  }

  /// Look up a field by its wire name.
  fn field(&self, name: &str) -> Option<Value> {
    field_from_json(self, name)
  }
}

/// Field lookup through the record's JSON form.
pub(crate) fn field_from_json<T: Serialize>(record: &T, name: &str) -> Option<Value> {
  match serde_json::to_value(record).ok()? {
    Value::Object(mut map) => map.remove(name),
    _ => None,
  }
}

/// Result from a sync operation, including data and the tier it came from.
#[derive(Debug, Clone)]
pub struct Synced<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: Source,
}

impl<T> Synced<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: Source::Network,
    }
  }

  pub fn from_store(data: T) -> Self {
    Self {
      data,
      source: Source::Store,
    }
  }

  /// Both tiers failed; `data` is the empty value.
  pub fn unavailable(data: T) -> Self {
    Self {
      data,
      source: Source::Unavailable,
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source != Source::Network
  }
}

/// Indicates where synced data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  /// Fresh data from network, already written through to the store
  Network,
  /// Network unavailable, serving stored data
  Store,
  /// Network and store both unavailable
  Unavailable,
}
