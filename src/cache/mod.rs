//! Request-intercepting cache worker with offline support.
//!
//! This module provides:
//! - Versioned static generations populated all-or-nothing at install
//! - Eviction of every generation outside the allow-list at activation
//! - Network-first rate queries with a dynamic-cache fallback
//! - Connectivity notices on the `sw-messages` broadcast channel

mod channel;
mod controller;
mod keys;
mod registration;
mod storage;
mod worker;

pub use channel::{BroadcastChannel, ConnectivityMessage, WorkerMessage, SW_MESSAGES};
pub use controller::CacheNames;
pub use keys::Classifier;
pub use registration::{Registration, RegistrationOutcome};
pub use storage::SqliteCacheStorage;
pub use worker::{ServiceWorker, WorkerHandle};
