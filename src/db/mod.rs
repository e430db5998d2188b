pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Get the default data directory
pub fn default_data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| Error::StorageUnavailable("Could not determine data directory".into()))?;

  Ok(data_dir.join("convter"))
}

/// Open or create a database file and apply the given schema
pub fn open(path: &Path, schema: &str) -> Result<Connection> {
  // Ensure parent directory exists
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| {
      Error::StorageUnavailable(format!("Failed to create database directory: {}", e))
    })?;
  }

  let conn = Connection::open(path).map_err(|e| {
    Error::StorageUnavailable(format!(
      "Failed to open database at {}: {}",
      path.display(),
      e
    ))
  })?;

  run_migrations(&conn, schema)?;
  Ok(conn)
}

/// Open a private in-memory database with the given schema
pub fn open_in_memory(schema: &str) -> Result<Connection> {
  let conn = Connection::open_in_memory()?;
  run_migrations(&conn, schema)?;
  Ok(conn)
}

fn run_migrations(conn: &Connection, schema: &str) -> Result<()> {
  conn
    .execute_batch(schema)
    .map_err(|e| Error::StorageUnavailable(format!("Failed to run migrations: {}", e)))
}
