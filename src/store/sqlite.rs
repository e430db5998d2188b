//! SQLite implementation of the local store.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::db::{self, schema::STORE_SCHEMA};
use crate::error::{Error, Result};

use super::traits::{LocalStore, Record};

/// SQLite-based record store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    let conn = db::open(path, STORE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// A store that lives only as long as the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = db::open_in_memory(STORE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::StorageUnavailable(format!("Lock poisoned: {}", e)))
  }
}

fn upsert<T: Record>(conn: &Connection, record: &T) -> Result<()> {
  let data = serde_json::to_vec(record)
    .map_err(|e| Error::StorageUnavailable(format!("Failed to serialize record: {}", e)))?;

  conn.execute(
    "INSERT OR REPLACE INTO records (collection, id, data, stored_at)
     VALUES (?, ?, ?, ?)",
    params![
      T::collection().name(),
      record.record_id(),
      data,
      Utc::now().to_rfc3339()
    ],
  )?;

  Ok(())
}

impl LocalStore for SqliteStore {
  fn put<T: Record>(&self, record: &T) -> Result<()> {
    let conn = self.lock()?;
    upsert(&conn, record)
  }

  fn put_all<T: Record>(&self, records: &[T]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    for record in records {
      upsert(&tx, record)?;
    }
    tx.commit()?;
    Ok(())
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    let conn = self.lock()?;
    let collection = T::collection().name();

    let mut stmt = conn.prepare("SELECT id, data FROM records WHERE collection = ? ORDER BY id")?;

    let rows: Vec<(String, Vec<u8>)> = stmt
      .query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))?
      .collect::<rusqlite::Result<_>>()?;

    let records = rows
      .into_iter()
      .filter_map(|(id, data)| match serde_json::from_slice(&data) {
        Ok(record) => Some(record),
        Err(e) => {
          warn!(collection, id = %id, error = %e, "skipping unreadable record");
          None
        }
      })
      .collect();

    Ok(records)
  }

  fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
    let conn = self.lock()?;
    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM records WHERE collection = ? AND id = ?",
        params![T::collection().name(), id],
        |row| row.get(0),
      )
      .optional()?;

    match data {
      Some(data) => serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| Error::StorageUnavailable(format!("Unreadable record {}: {}", id, e))),
      None => Ok(None),
    }
  }

  fn delete<T: Record>(&self, id: &str) -> Result<bool> {
    let conn = self.lock()?;
    let removed = conn.execute(
      "DELETE FROM records WHERE collection = ? AND id = ?",
      params![T::collection().name(), id],
    )?;
    Ok(removed > 0)
  }
}
