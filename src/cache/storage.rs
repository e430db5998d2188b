//! Cache storage trait and SQLite implementation.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::db::{self, schema::CACHE_SCHEMA};
use crate::error::{Error, Result};
use crate::net::Response;

use super::keys::CacheKey;

/// Trait for cache storage backends.
///
/// Entries live in named generations; a generation is created by its first
/// write and removed wholesale by `delete`.
pub trait CacheStorage: Send + Sync {
  /// Names of all generations, oldest first.
  fn keys(&self) -> Result<Vec<String>>;

  /// Whether a generation exists.
  fn has(&self, generation: &str) -> Result<bool>;

  /// Store one response, creating the generation if needed.
  fn put(&self, generation: &str, key: &CacheKey, response: &Response) -> Result<()>;

  /// Create a generation holding exactly `entries`, or nothing at all.
  fn put_all(&self, generation: &str, entries: &[(CacheKey, Response)]) -> Result<()>;

  /// Exact-request lookup across every generation, oldest generation first.
  fn match_request(&self, key: &CacheKey) -> Result<Option<Response>>;

  /// Most recently cached response for an equivalent request in `generation`.
  fn match_query(&self, generation: &str, key: &CacheKey) -> Result<Option<Response>>;

  /// Drop a generation and its entries. Returns whether it existed.
  fn delete(&self, generation: &str) -> Result<bool>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteCacheStorage {
  conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
  pub fn open(path: &Path) -> Result<Self> {
    let conn = db::open(path, CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = db::open_in_memory(CACHE_SCHEMA)?;
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

fn now() -> String {
  // Sub-second precision so "most recent" is meaningful within a run
  Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ensure_generation(conn: &Connection, generation: &str) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?, ?)",
    params![generation, now()],
  )?;
  Ok(())
}

fn insert_entry(
  conn: &Connection,
  generation: &str,
  key: &CacheKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| Error::StorageUnavailable(format!("Failed to serialize headers: {}", e)))?;

  conn.execute(
    "INSERT OR REPLACE INTO cache_entries
       (generation, request_key, query_key, url, status, headers, body, cached_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    params![
      generation,
      key.request,
      key.query,
      response.url,
      response.status,
      headers,
      response.body,
      now()
    ],
  )?;
  Ok(())
}

type EntryRow = (String, u16, String, Vec<u8>);

fn into_response((url, status, headers, body): EntryRow) -> Result<Response> {
  let headers = serde_json::from_str(&headers)
    .map_err(|e| Error::StorageUnavailable(format!("Failed to parse cached headers: {}", e)))?;
  Ok(Response {
    url,
    status,
    headers,
    body,
  })
}

impl CacheStorage for SqliteCacheStorage {
  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM cache_generations ORDER BY created_at, rowid")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  fn has(&self, generation: &str) -> Result<bool> {
    let conn = self.lock()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM cache_generations WHERE name = ?",
        params![generation],
        |row| row.get(0),
      )
      .optional()?;
    Ok(found.is_some())
  }

  fn put(&self, generation: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    ensure_generation(&tx, generation)?;
    insert_entry(&tx, generation, key, response)?;
    tx.commit()?;
    Ok(())
  }

  fn put_all(&self, generation: &str, entries: &[(CacheKey, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    ensure_generation(&tx, generation)?;
    for (key, response) in entries {
      insert_entry(&tx, generation, key, response)?;
    }
    // Dropping `tx` on any error above rolls the generation back
    tx.commit()?;
    Ok(())
  }

  fn match_request(&self, key: &CacheKey) -> Result<Option<Response>> {
    let conn = self.lock()?;
    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT e.url, e.status, e.headers, e.body
         FROM cache_entries e
         INNER JOIN cache_generations g ON g.name = e.generation
         WHERE e.request_key = ?
         ORDER BY g.created_at, g.rowid
         LIMIT 1",
        params![key.request],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()?;

    row.map(into_response).transpose()
  }

  fn match_query(&self, generation: &str, key: &CacheKey) -> Result<Option<Response>> {
    let conn = self.lock()?;
    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT url, status, headers, body
         FROM cache_entries
         WHERE generation = ? AND query_key = ?
         ORDER BY cached_at DESC, rowid DESC
         LIMIT 1",
        params![generation, key.query],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()?;

    row.map(into_response).transpose()
  }

  fn delete(&self, generation: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    tx.execute(
      "DELETE FROM cache_entries WHERE generation = ?",
      params![generation],
    )?;
    let removed = tx.execute(
      "DELETE FROM cache_generations WHERE name = ?",
      params![generation],
    )?;
    tx.commit()?;
    Ok(removed > 0)
  }
}
