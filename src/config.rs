use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::schema::SCHEMA_VERSION;
use crate::error::StoreError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub remote: RemoteConfig,
  #[serde(default)]
  pub store: StoreConfig,
}

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
  pub restaurants_url: String,
  pub reviews_url: String,
  /// Per-request timeout; expiry counts as a network failure
  pub timeout_secs: u64,
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      restaurants_url: "http://localhost:1337/restaurants".to_string(),
      reviews_url: "http://localhost:1337/reviews".to_string(),
      timeout_secs: 10,
    }
  }
}

impl RemoteConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }
}

/// Identity and version of the local store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Store name; also the database file stem when `path` is unset
  pub name: String,
  /// Explicit database file, overriding the data-directory default
  pub path: Option<PathBuf>,
  /// Schema version to open the store at
  pub version: u32,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      name: "RestaurantDB".to_string(),
      path: None,
      version: SCHEMA_VERSION,
    }
  }
}

impl StoreConfig {
  /// Database file location: `path` if set, else `<data_dir>/dinecache/<name>.db`.
  pub fn resolve_path(&self) -> Result<PathBuf, StoreError> {
    if let Some(path) = &self.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StoreError::NoDataDir)?;

    Ok(data_dir.join("dinecache").join(format!("{}.db", self.name)))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dinecache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dinecache/config.yaml
  ///
  /// Without any file the defaults point at a backend on localhost:1337.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dinecache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dinecache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.remote.restaurants_url, "http://localhost:1337/restaurants");
    assert_eq!(config.store.name, "RestaurantDB");
    assert_eq!(config.store.version, SCHEMA_VERSION);
    assert_eq!(config.remote.timeout(), Duration::from_secs(10));
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::parse(
      "remote:\n  restaurants_url: http://example.test/r\nstore:\n  path: /tmp/x.db\n",
    )
    .unwrap();
    assert_eq!(config.remote.restaurants_url, "http://example.test/r");
    assert_eq!(config.remote.reviews_url, "http://localhost:1337/reviews");
    assert_eq!(config.store.resolve_path().unwrap(), PathBuf::from("/tmp/x.db"));
    assert_eq!(config.store.version, SCHEMA_VERSION);
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.store.name, "RestaurantDB");
  }

  #[test]
  fn test_zero_timeout_is_clamped() {
    let config = RemoteConfig {
      timeout_secs: 0,
      ..RemoteConfig::default()
    };
    assert_eq!(config.timeout(), Duration::from_secs(1));
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "store:\n  name: TestDB\n  version: 2\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.store.name, "TestDB");
    assert_eq!(config.store.version, 2);
  }
}
