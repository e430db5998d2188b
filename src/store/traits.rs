//! Core traits for the local store.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// The collections held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
  Currencies,
  Conversions,
}

impl Collection {
  pub fn name(&self) -> &'static str {
    match self {
      Collection::Currencies => "currencies",
      Collection::Conversions => "conversions",
    }
  }
}

/// Trait for records that live in a collection.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique key within the collection (currency code, conversion id)
  fn record_id(&self) -> String;

  /// Collection this record type belongs to
  fn collection() -> Collection;
}

/// Trait for store backends.
///
/// Every operation fails only with `Error::StorageUnavailable`.
pub trait LocalStore: Send + Sync {
  /// Insert or replace a record by key.
  fn put<T: Record>(&self, record: &T) -> Result<()>;

  /// Insert or replace several records in one go.
  fn put_all<T: Record>(&self, records: &[T]) -> Result<()>;

  /// Every record of the collection, ordered by key. Empty is not an error.
  fn get_all<T: Record>(&self) -> Result<Vec<T>>;

  /// One record by key, if present.
  fn get<T: Record>(&self, id: &str) -> Result<Option<T>>;

  /// Remove a record by key. Returns whether something was removed;
  /// a missing key is not an error.
  fn delete<T: Record>(&self, id: &str) -> Result<bool>;
}

impl<S: LocalStore> LocalStore for std::sync::Arc<S> {
  fn put<T: Record>(&self, record: &T) -> Result<()> {
    (**self).put(record)
  }

  fn put_all<T: Record>(&self, records: &[T]) -> Result<()> {
    (**self).put_all(records)
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    (**self).get_all()
  }

  fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
    (**self).get(id)
  }

  fn delete<T: Record>(&self, id: &str) -> Result<bool> {
    (**self).delete::<T>(id)
  }
}
