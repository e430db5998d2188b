//! Messages exchanged between the cache worker and the foreground.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Name of the channel carrying connectivity notices
pub const SW_MESSAGES: &str = "sw-messages";

const CHANNEL_CAPACITY: usize = 16;

/// Published by the worker when a rate query had to be answered offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityMessage {
  pub is_offline: bool,
}

impl ConnectivityMessage {
  pub fn offline() -> Self {
    Self { is_offline: true }
  }
}

/// Control message posted from the foreground to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkerMessage {
  /// Activate a waiting version right away
  SkipWaiting,
}

/// A named fire-and-forget channel; every subscriber sees every message
/// posted after it subscribed.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
  name: &'static str,
  tx: broadcast::Sender<ConnectivityMessage>,
}

impl BroadcastChannel {
  pub fn new(name: &'static str) -> Self {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { name, tx }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Post a message. Having no listeners is fine.
  pub fn post(&self, message: ConnectivityMessage) {
    let _ = self.tx.send(message);
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityMessage> {
    self.tx.subscribe()
  }
}
