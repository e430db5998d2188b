//! Durable record store.
//!
//! Two independent collections (currencies, conversions), each keyed by
//! record id. Records are upserted whole; nothing spans collections.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Collection, LocalStore, Record};
