//! SQLite-backed local store.
//!
//! The store is opened lazily the first time any operation needs it. Opening
//! walks `Closed -> Opening -> (Upgrading ->) Ready`, or ends in `Failed`.
//! Concurrent callers during `Opening`/`Upgrading` wait on the same
//! initialization instead of racing to create tables. A failed attempt is not
//! cached: the next operation tries to open again.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::schema::{self, SCHEMA_VERSION};
use super::traits::{Record, RecordKind};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// How long SQLite waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of the underlying database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
  Closed,
  Opening,
  Upgrading,
  Ready,
  Failed,
}

#[derive(Debug, Clone)]
enum Location {
  Config(StoreConfig),
  Memory,
}

type Handle = Arc<Mutex<Connection>>;

/// Versioned local store with one table per record kind.
pub struct LocalStore {
  location: Location,
  version: u32,
  conn: OnceCell<Handle>,
  state: Arc<Mutex<StoreState>>,
}

impl LocalStore {
  /// Create a store described by `config`. Nothing is opened until first use.
  pub fn new(config: StoreConfig) -> Self {
    let version = config.version;
    Self {
      location: Location::Config(config),
      version,
      conn: OnceCell::new(),
      state: Arc::new(Mutex::new(StoreState::Closed)),
    }
  }

  /// Create a private in-memory store at the latest schema version.
  pub fn in_memory() -> Self {
    Self {
      location: Location::Memory,
      version: SCHEMA_VERSION,
      conn: OnceCell::new(),
      state: Arc::new(Mutex::new(StoreState::Closed)),
    }
  }

  pub fn state(&self) -> StoreState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(StoreState::Failed)
  }

  /// Open the store now, running any pending migration.
  pub async fn open(&self) -> Result<(), StoreError> {
    self.handle().await.map(|_| ())
  }

  async fn handle(&self) -> Result<Handle, StoreError> {
    let handle = self.conn.get_or_try_init(|| self.initialize()).await?;
    Ok(Arc::clone(handle))
  }

  async fn initialize(&self) -> Result<Handle, StoreError> {
    set_state(&self.state, StoreState::Opening);

    let location = self.location.clone();
    let requested = self.version;
    let state = Arc::clone(&self.state);

    let opened = tokio::task::spawn_blocking(move || open_connection(&location, requested, &state))
      .await
      .map_err(StoreError::from)
      .and_then(|r| r);

    match opened {
      Ok(conn) => {
        set_state(&self.state, StoreState::Ready);
        debug!(version = requested, "Local store ready");
        Ok(Arc::new(Mutex::new(conn)))
      }
      Err(e) => {
        set_state(&self.state, StoreState::Failed);
        warn!(error = %e, "Failed to open local store");
        Err(e)
      }
    }
  }

  /// Run `f` against the connection on the blocking pool.
  async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
  {
    let handle = self.handle().await?;
    tokio::task::spawn_blocking(move || {
      let mut conn = handle.lock().map_err(|_| StoreError::Poisoned)?;
      f(&mut conn)
    })
    .await?
  }

  /// Upsert every record by primary key in one transaction.
  pub async fn put_all<R: Record>(&self, records: &[R]) -> Result<(), StoreError> {
    if records.is_empty() {
      return Ok(());
    }

    let rows = records
      .iter()
      .map(|r| -> Result<(i64, i64, String), StoreError> {
        Ok((r.id(), r.lookup_key(), serde_json::to_string(r)?))
      })
      .collect::<Result<Vec<_>, _>>()?;
    let count = rows.len();

    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(upsert_sql(R::KIND))?;
          for (id, lookup, data) in &rows {
            match R::KIND {
              RecordKind::Restaurant => stmt.execute(params![id, data])?,
              RecordKind::Review => stmt.execute(params![id, lookup, data])?,
            };
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(kind = %R::KIND, count, "Stored records");
    Ok(())
  }

  /// Upsert a single record.
  pub async fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
    self.put_all(std::slice::from_ref(record)).await
  }

  /// Every stored record of kind `R`, in unspecified order.
  pub async fn get_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
    let sql = format!("SELECT data FROM {}", R::KIND.table());
    self.query_records(sql, None).await
  }

  /// Records whose secondary index column equals `key`.
  pub async fn get_by_lookup_key<R: Record>(&self, key: i64) -> Result<Vec<R>, StoreError> {
    let sql = format!(
      "SELECT data FROM {} WHERE {} = ?1",
      R::KIND.table(),
      R::KIND.lookup_column()
    );
    self.query_records(sql, Some(key)).await
  }

  /// A single record by primary key.
  pub async fn get<R: Record>(&self, id: i64) -> Result<Option<R>, StoreError> {
    let sql = format!("SELECT data FROM {} WHERE id = ?1", R::KIND.table());
    let mut found: Vec<R> = self.query_records(sql, Some(id)).await?;
    Ok(found.pop())
  }

  /// Number of stored records of `kind`.
  pub async fn count(&self, kind: RecordKind) -> Result<usize, StoreError> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    self
      .with_conn(move |conn| {
        let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
      })
      .await
  }

  async fn query_records<R: Record>(
    &self,
    sql: String,
    key: Option<i64>,
  ) -> Result<Vec<R>, StoreError> {
    let rows: Vec<String> = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = match key {
          Some(k) => stmt
            .query_map(params![k], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?,
          None => stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?,
        };
        Ok(rows)
      })
      .await?;

    let records = rows
      .iter()
      .filter_map(|data| match serde_json::from_str::<R>(data) {
        Ok(record) => Some(record),
        Err(e) => {
          warn!(kind = %R::KIND, error = %e, "Skipping undecodable stored record");
          None
        }
      })
      .collect();

    Ok(records)
  }
}

fn upsert_sql(kind: RecordKind) -> &'static str {
  match kind {
    RecordKind::Restaurant => {
      "INSERT OR REPLACE INTO restaurant_store (id, data, cached_at)
       VALUES (?1, ?2, datetime('now'))"
    }
    RecordKind::Review => {
      "INSERT OR REPLACE INTO review_store (id, restaurant_id, data, cached_at)
       VALUES (?1, ?2, ?3, datetime('now'))"
    }
  }
}

fn set_state(state: &Mutex<StoreState>, next: StoreState) {
  if let Ok(mut s) = state.lock() {
    *s = next;
  }
}

fn open_connection(
  location: &Location,
  requested: u32,
  state: &Mutex<StoreState>,
) -> Result<Connection, StoreError> {
  schema::check_requested(requested)?;

  let mut conn = match location {
    Location::Memory => Connection::open_in_memory()?,
    Location::Config(config) => {
      let path = config.resolve_path()?;
      ensure_parent(&path)?;
      info!("Opening local store at {}", path.display());
      let conn = Connection::open(&path)?;
      conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
      )?;
      conn
    }
  };
  conn.busy_timeout(BUSY_TIMEOUT)?;

  let stored = schema::stored_version(&conn)?;
  if stored > requested {
    return Err(StoreError::VersionTooNew { stored, requested });
  }

  let steps = schema::plan_migration(stored, requested);
  if !steps.is_empty() {
    set_state(state, StoreState::Upgrading);
    info!(from = stored, to = requested, steps = steps.len(), "Upgrading local store schema");
    schema::apply(&mut conn, &steps, requested)?;
  }

  Ok(conn)
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() && !parent.exists() {
      std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirectory {
        path: parent.to_path_buf(),
        source: e,
      })?;
    }
  }
  Ok(())
}
