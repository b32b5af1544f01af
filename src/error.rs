//! Error taxonomy for the cache and sync layer.
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`NetworkError`] | remote tier | Sync falls back to the local store |
//! | [`StoreError`] | local store | Sync treats the store as empty |
//! | [`Error::Validation`] | mutation paths | Surfaced to the caller |
//!
//! The sync coordinator never returns any of these; the mutation gateway
//! returns all of them as [`Error`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type for mutation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length for error response bodies kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure of a remote round trip.
#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("{url} returned status {status}: {body}")]
  Status {
    url: String,
    status: u16,
    body: String,
  },

  #[error("Request to {url} timed out")]
  Timeout { url: String },

  #[error("Transport error: {0}")]
  Transport(#[source] reqwest::Error),

  #[error("Invalid response payload: {0}")]
  Decode(String),

  #[error("Invalid endpoint URL {url}: {reason}")]
  InvalidUrl { url: String, reason: String },
}

impl NetworkError {
  /// Build a status error, truncating the body so large error pages stay out of logs.
  pub fn from_status(url: &str, status: reqwest::StatusCode, body: &str) -> Self {
    let body = if body.len() <= MAX_ERROR_BODY_LENGTH {
      body.to_string()
    } else {
      let mut end = MAX_ERROR_BODY_LENGTH;
      while !body.is_char_boundary(end) {
        end -= 1;
      }
      format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    };

    NetworkError::Status {
      url: url.to_string(),
      status: status.as_u16(),
      body,
    }
  }
}

impl From<reqwest::Error> for NetworkError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      let url = err.url().map(|u| u.to_string()).unwrap_or_default();
      NetworkError::Timeout { url }
    } else if err.is_decode() {
      NetworkError::Decode(err.to_string())
    } else {
      NetworkError::Transport(err)
    }
  }
}

impl From<serde_json::Error> for NetworkError {
  fn from(err: serde_json::Error) -> Self {
    NetworkError::Decode(err.to_string())
  }
}

/// Failure of the local store.
#[derive(Error, Debug)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Failed to create store directory {path}: {source}")]
  CreateDirectory {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("Stored schema version {stored} is newer than requested version {requested}")]
  VersionTooNew { stored: u32, requested: u32 },

  #[error("Unsupported schema version {0}")]
  UnsupportedVersion(u32),

  #[error("Could not determine a data directory for the store")]
  NoDataDir,

  #[error("Store connection lock poisoned")]
  Poisoned,

  #[error("Store task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Errors surfaced by the mutation gateway.
#[derive(Error, Debug)]
pub enum Error {
  #[error("Network error: {0}")]
  Network(#[from] NetworkError),

  #[error("Validation error: {0}")]
  Validation(String),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Error::Validation(msg.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_body_is_truncated() {
    let body = "x".repeat(2000);
    let err = NetworkError::from_status("http://host/r", reqwest::StatusCode::BAD_GATEWAY, &body);

    match err {
      NetworkError::Status { status, body, .. } => {
        assert_eq!(status, 502);
        assert!(body.contains("truncated, 2000 total bytes"));
        assert!(body.len() < 600);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn test_short_body_kept_verbatim() {
    let err = NetworkError::from_status("http://host/r", reqwest::StatusCode::NOT_FOUND, "nope");
    assert_eq!(err.to_string(), "http://host/r returned status 404: nope");
  }
}
