//! Error types shared by the store, the cache worker and the rates client.

use thiserror::Error;

/// Errors produced below the application edge.
#[derive(Error, Debug)]
pub enum Error {
  /// The durable store could not be opened, read or written
  #[error("Storage unavailable: {0}")]
  StorageUnavailable(String),

  /// A collection has no records yet
  #[error("No saved {0} in local store")]
  EmptyStore(&'static str),

  /// A provider response did not have the expected shape
  #[error("Malformed response: {0}")]
  MalformedResponse(String),

  /// Network unreachable or failing, and nothing cached to fall back on
  #[error("Offline: {0}")]
  Offline(String),

  /// Transport-level failure (DNS, connect, reset)
  #[error("Network error: {0}")]
  Network(String),

  /// A non-2xx response surfaced to the caller
  #[error("Request to {url} failed with status {status}")]
  Status { url: String, status: u16 },

  /// A shell asset could not be fetched during install
  #[error("Failed to install shell asset {url}: {reason}")]
  AssetInstall { url: String, reason: String },

  /// Bad user input (currency code, amount, id)
  #[error("Invalid input: {0}")]
  InvalidInput(String),

  /// A worker lifecycle step was requested from the wrong state
  #[error("Invalid worker state: {0}")]
  InvalidState(String),

  /// The background cache worker is no longer running
  #[error("Cache worker stopped")]
  WorkerGone,
}

impl Error {
  /// Whether this error means the network could not be used.
  pub fn is_connectivity(&self) -> bool {
    matches!(self, Error::Offline(_) | Error::Network(_))
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Error::StorageUnavailable(e.to_string())
  }
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    Error::Network(e.to_string())
  }
}

/// Result type alias for domain errors
pub type Result<T, E = Error> = std::result::Result<T, E>;
