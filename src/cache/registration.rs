//! Version lifecycle: which controller serves, which one waits.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::net::Network;

use super::channel::BroadcastChannel;
use super::controller::{CacheController, CacheNames, WorkerState};
use super::keys::Classifier;
use super::storage::CacheStorage;

/// What `register` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
  /// This version was installed by an earlier run and is now serving
  AlreadyActive { version: String },
  /// Nothing was installed before; this version installed and activated
  FirstInstall { version: String },
  /// Installed next to an older version, which keeps serving until
  /// a skip-waiting message arrives
  UpdateReady { version: String, serving: String },
  /// Install failed; `serving` is the older version still in charge, if any
  InstallFailed {
    version: String,
    reason: String,
    serving: Option<String>,
  },
}

/// Owns the active and waiting controllers.
pub struct Registration<S: CacheStorage, N: Network> {
  names: CacheNames,
  classifier: Arc<Classifier>,
  storage: Arc<S>,
  network: Arc<N>,
  channel: BroadcastChannel,
  active: Option<CacheController<S, N>>,
  waiting: Option<CacheController<S, N>>,
}

impl<S: CacheStorage, N: Network> Registration<S, N> {
  pub fn new(
    names: CacheNames,
    classifier: Classifier,
    storage: Arc<S>,
    network: Arc<N>,
    channel: BroadcastChannel,
  ) -> Self {
    Self {
      names,
      classifier: Arc::new(classifier),
      storage,
      network,
      channel,
      active: None,
      waiting: None,
    }
  }

  fn controller(&self, names: CacheNames) -> CacheController<S, N> {
    CacheController::new(
      names,
      Arc::clone(&self.classifier),
      Arc::clone(&self.storage),
      Arc::clone(&self.network),
      self.channel.clone(),
    )
  }

  pub fn network(&self) -> Arc<N> {
    Arc::clone(&self.network)
  }

  pub fn active(&self) -> Option<&CacheController<S, N>> {
    self.active.as_ref()
  }

  #[cfg(test)]
  pub fn waiting(&self) -> Option<&CacheController<S, N>> {
    self.waiting.as_ref()
  }

  /// Bring the configured version up.
  pub async fn register(&mut self) -> RegistrationOutcome {
    let version = self.names.version().to_string();
    let current = self.names.static_name();

    let installed = self.storage.has(&current).unwrap_or_else(|e| {
      warn!(generation = %current, error = %e, "could not look up cache generation");
      false
    });

    let controller = self.controller(self.names.clone());

    if installed {
      // Installed by an earlier run; a new run has no clients to wait for
      controller.set_state(WorkerState::Installed);
      if let Err(e) = controller.activate() {
        warn!(error = %e, "activation failed");
      }
      self.active = Some(controller);
      return RegistrationOutcome::AlreadyActive { version };
    }

    let generations = self.storage.keys().unwrap_or_else(|e| {
      warn!(error = %e, "could not list cache generations");
      Vec::new()
    });

    // The newest older static generation keeps serving meanwhile
    let previous = generations
      .iter()
      .rev()
      .find_map(|name| self.names.version_of(name));
    if let Some(names) = previous {
      let old = self.controller(names);
      old.set_state(WorkerState::Activated);
      self.active = Some(old);
    }
    let serving = self.active_version();

    match controller.install().await {
      Ok(()) => match serving {
        None => {
          if let Err(e) = controller.activate() {
            warn!(error = %e, "activation failed");
          }
          self.active = Some(controller);
          RegistrationOutcome::FirstInstall { version }
        }
        Some(serving) => {
          info!(version = %version, serving = %serving, "update waiting");
          self.waiting = Some(controller);
          RegistrationOutcome::UpdateReady { version, serving }
        }
      },
      Err(e) => RegistrationOutcome::InstallFailed {
        version,
        reason: e.to_string(),
        serving,
      },
    }
  }

  /// Promote the waiting version. Returns whether there was one.
  pub fn skip_waiting(&mut self) -> Result<bool> {
    let Some(waiting) = self.waiting.take() else {
      return Ok(false);
    };

    waiting.activate()?;
    if let Some(old) = self.active.replace(waiting) {
      old.set_state(WorkerState::Redundant);
    }
    Ok(true)
  }

  /// Version of the controller currently serving
  pub fn active_version(&self) -> Option<String> {
    self
      .active
      .as_ref()
      .map(|c| c.names().version().to_string())
  }
}
