use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::cache::RecordKind;
use crate::config::RemoteConfig;
use crate::error::NetworkError;
use crate::model::NewReview;

use super::source::RemoteSource;

/// HTTP client for the restaurant backend.
/// Clone is cheap - reqwest::Client shares its connection pool.
#[derive(Clone, Debug)]
pub struct HttpRemote {
  client: Client,
  restaurants: Url,
  reviews: Url,
}

impl HttpRemote {
  pub fn new(config: &RemoteConfig) -> Result<Self, NetworkError> {
    let client = Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(NetworkError::Transport)?;

    Ok(Self {
      client,
      restaurants: parse_base(&config.restaurants_url)?,
      reviews: parse_base(&config.reviews_url)?,
    })
  }

  fn base(&self, kind: RecordKind) -> &Url {
    match kind {
      RecordKind::Restaurant => &self.restaurants,
      RecordKind::Review => &self.reviews,
    }
  }

  /// `<reviews-base>/?restaurant_id=<id>`
  pub fn reviews_url(&self, restaurant_id: i64) -> Url {
    endpoint(
      &self.reviews,
      &[""],
      &[("restaurant_id", restaurant_id.to_string())],
    )
  }

  /// `<base>/<id>/?<field>=<value>`
  pub fn update_url(&self, kind: RecordKind, id: i64, field: &str, value: bool) -> Url {
    let id = id.to_string();
    endpoint(
      self.base(kind),
      &[id.as_str(), ""],
      &[(field, value.to_string())],
    )
  }

  /// Send a request and decode its JSON body, mapping every failure to a
  /// [`NetworkError`].
  async fn send_json(&self, url: &Url, request: RequestBuilder) -> Result<Value, NetworkError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(NetworkError::from_status(url.as_str(), status, &body));
    }

    let bytes = response.bytes().await?;
    let payload = serde_json::from_slice(&bytes)?;
    debug!(url = %url, status = status.as_u16(), bytes = bytes.len(), "Remote response received");
    Ok(payload)
  }
}

impl RemoteSource for HttpRemote {
  async fn fetch_collection(&self, kind: RecordKind) -> Result<Value, NetworkError> {
    let url = self.base(kind).clone();
    self.send_json(&url, self.client.get(url.clone())).await
  }

  async fn fetch_reviews_for_restaurant(&self, restaurant_id: i64) -> Result<Value, NetworkError> {
    let url = self.reviews_url(restaurant_id);
    self.send_json(&url, self.client.get(url.clone())).await
  }

  async fn update_field(
    &self,
    kind: RecordKind,
    id: i64,
    field: &str,
    value: bool,
  ) -> Result<Value, NetworkError> {
    let url = self.update_url(kind, id, field, value);
    self.send_json(&url, self.client.put(url.clone())).await
  }

  async fn create_review(&self, review: &NewReview) -> Result<Value, NetworkError> {
    let url = endpoint(&self.reviews, &[""], &[]);
    self
      .send_json(&url, self.client.post(url.clone()).json(review))
      .await
  }
}

fn parse_base(raw: &str) -> Result<Url, NetworkError> {
  let url = Url::parse(raw).map_err(|e| NetworkError::InvalidUrl {
    url: raw.to_string(),
    reason: e.to_string(),
  })?;

  if url.cannot_be_a_base() {
    return Err(NetworkError::InvalidUrl {
      url: raw.to_string(),
      reason: "not a hierarchical URL".to_string(),
    });
  }

  Ok(url)
}

/// Append path segments and query pairs to a base URL. An empty trailing
/// segment yields a trailing slash, which the backend expects before `?`.
fn endpoint(base: &Url, segments: &[&str], query: &[(&str, String)]) -> Url {
  let mut url = base.clone();
  if let Ok(mut path) = url.path_segments_mut() {
    path.pop_if_empty().extend(segments);
  }
  if !query.is_empty() {
    let mut pairs = url.query_pairs_mut();
    for (key, value) in query {
      pairs.append_pair(key, value);
    }
  }
  url
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  fn remote_for(base: &str) -> HttpRemote {
    HttpRemote::new(&RemoteConfig {
      restaurants_url: format!("{base}/restaurants"),
      reviews_url: format!("{base}/reviews"),
      timeout_secs: 2,
    })
    .unwrap()
  }

  /// Serve exactly one canned HTTP response on a local port.
  async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = vec![0u8; 4096];
      let mut read = Vec::new();
      while !read.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
          break;
        }
        read.extend_from_slice(&buf[..n]);
      }
      let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      socket.shutdown().await.ok();
    });

    format!("http://{addr}")
  }

  #[test]
  fn test_reviews_url() {
    let remote = remote_for("http://localhost:1337");
    assert_eq!(
      remote.reviews_url(42).as_str(),
      "http://localhost:1337/reviews/?restaurant_id=42"
    );
  }

  #[test]
  fn test_update_url() {
    let remote = remote_for("http://localhost:1337");
    assert_eq!(
      remote
        .update_url(RecordKind::Restaurant, 5, "is_favorite", true)
        .as_str(),
      "http://localhost:1337/restaurants/5/?is_favorite=true"
    );
  }

  #[test]
  fn test_trailing_slash_base() {
    let remote = HttpRemote::new(&RemoteConfig {
      restaurants_url: "http://localhost:1337/restaurants/".to_string(),
      reviews_url: "http://localhost:1337/reviews/".to_string(),
      timeout_secs: 2,
    })
    .unwrap();
    assert_eq!(
      remote
        .update_url(RecordKind::Restaurant, 3, "is_favorite", false)
        .as_str(),
      "http://localhost:1337/restaurants/3/?is_favorite=false"
    );
  }

  #[test]
  fn test_invalid_base_url() {
    let err = HttpRemote::new(&RemoteConfig {
      restaurants_url: "not a url".to_string(),
      ..RemoteConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidUrl { .. }));
  }

  #[tokio::test]
  async fn test_success_returns_payload() {
    let base = serve_once("200 OK", r#"[{"id":1},{"id":2}]"#).await;
    let remote = remote_for(&base);

    let payload = remote.fetch_collection(RecordKind::Restaurant).await.unwrap();
    assert_eq!(payload.as_array().map(|a| a.len()), Some(2));
  }

  #[tokio::test]
  async fn test_non_success_status_is_error() {
    let base = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
    let remote = remote_for(&base);

    let err = remote.fetch_collection(RecordKind::Restaurant).await.unwrap_err();
    match err {
      NetworkError::Status { status, body, .. } => {
        assert_eq!(status, 500);
        assert!(body.contains("boom"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_malformed_body_is_decode_error() {
    let base = serve_once("200 OK", "<html>").await;
    let remote = remote_for(&base);

    let err = remote.fetch_reviews_for_restaurant(1).await.unwrap_err();
    assert!(matches!(err, NetworkError::Decode(_)));
  }

  #[tokio::test]
  async fn test_connection_refused_is_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = remote_for(&format!("http://{addr}"));
    assert!(remote.fetch_collection(RecordKind::Review).await.is_err());
  }

  #[tokio::test]
  async fn test_timeout_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accept and hold the connection without ever answering.
    let server = tokio::spawn(async move {
      let (socket, _) = listener.accept().await.unwrap();
      tokio::time::sleep(std::time::Duration::from_secs(10)).await;
      drop(socket);
    });

    let remote = HttpRemote::new(&RemoteConfig {
      restaurants_url: format!("http://{addr}/restaurants"),
      reviews_url: format!("http://{addr}/reviews"),
      timeout_secs: 1,
    })
    .unwrap();

    let err = remote.fetch_collection(RecordKind::Restaurant).await.unwrap_err();
    assert!(matches!(err, NetworkError::Timeout { .. }), "unexpected error: {err:?}");
    server.abort();
  }
}
