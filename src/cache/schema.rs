//! Store schema versions and migrations.
//!
//! Migration is split in two: [`plan_migration`] is a pure function from
//! (stored version, requested version) to the steps to run, and
//! [`apply`] executes a plan inside one transaction. Every step uses
//! `IF NOT EXISTS`, so re-running a step against an already migrated store
//! changes nothing.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::error::StoreError;

/// Latest schema version this build knows how to create.
pub const SCHEMA_VERSION: u32 = 3;

/// One schema upgrade step. The step for version `n` takes a store at
/// version `n - 1` to version `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
  /// v1: restaurant table
  CreateRestaurantStore,
  /// v2: review table
  CreateReviewStore,
  /// v3: secondary indices
  CreateLookupIndices,
}

impl MigrationStep {
  pub fn version(self) -> u32 {
    match self {
      MigrationStep::CreateRestaurantStore => 1,
      MigrationStep::CreateReviewStore => 2,
      MigrationStep::CreateLookupIndices => 3,
    }
  }

  fn for_version(version: u32) -> Option<Self> {
    match version {
      1 => Some(MigrationStep::CreateRestaurantStore),
      2 => Some(MigrationStep::CreateReviewStore),
      3 => Some(MigrationStep::CreateLookupIndices),
      _ => None,
    }
  }

  fn sql(self) -> &'static str {
    match self {
      MigrationStep::CreateRestaurantStore => {
        r#"
        CREATE TABLE IF NOT EXISTS restaurant_store (
            id INTEGER PRIMARY KEY,
            data TEXT NOT NULL,
            cached_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#
      }
      MigrationStep::CreateReviewStore => {
        r#"
        CREATE TABLE IF NOT EXISTS review_store (
            id INTEGER PRIMARY KEY,
            restaurant_id INTEGER NOT NULL,
            data TEXT NOT NULL,
            cached_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#
      }
      MigrationStep::CreateLookupIndices => {
        r#"
        CREATE INDEX IF NOT EXISTS by_id ON restaurant_store(id);
        CREATE INDEX IF NOT EXISTS restaurant_id ON review_store(restaurant_id);
        "#
      }
    }
  }
}

/// Compute the steps needed to bring a store at `current` up to `target`.
///
/// Returns an empty plan when the store is already at or past `target`;
/// refusing a downgrade is the caller's decision.
pub fn plan_migration(current: u32, target: u32) -> Vec<MigrationStep> {
  (current.saturating_add(1)..=target)
    .filter_map(MigrationStep::for_version)
    .collect()
}

/// Check a requested version against what this build supports.
pub fn check_requested(requested: u32) -> Result<(), StoreError> {
  if requested == 0 || requested > SCHEMA_VERSION {
    return Err(StoreError::UnsupportedVersion(requested));
  }
  Ok(())
}

/// Read the stored version; 0 for a fresh database.
pub fn stored_version(conn: &Connection) -> Result<u32, StoreError> {
  let exists: bool = conn.query_row(
    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
    [],
    |row| row.get(0),
  )?;

  if !exists {
    return Ok(0);
  }

  let version: Option<u32> = conn
    .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
      row.get(0)
    })
    .optional()?;

  Ok(version.unwrap_or(0))
}

/// Run `steps` and record `target` as the stored version, atomically.
///
/// The transaction takes the write lock up front so that two processes
/// upgrading the same file serialize on it. The stored version is read again
/// under that lock: if another process already reached `target` or beyond,
/// nothing is run and the stored version is left as is.
pub fn apply(conn: &mut Connection, steps: &[MigrationStep], target: u32) -> Result<(), StoreError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let stored = stored_version(&tx)?;
  if stored >= target {
    debug!(stored, target, "Schema already migrated");
    return Ok(());
  }

  tx.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_version (
         id INTEGER PRIMARY KEY CHECK (id = 1),
         version INTEGER NOT NULL
     );",
  )?;

  for step in steps.iter().filter(|step| step.version() > stored) {
    debug!(version = step.version(), step = ?step, "Applying schema step");
    tx.execute_batch(step.sql())?;
  }

  tx.execute(
    "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
    [target],
  )?;

  tx.commit()?;
  Ok(())
}
