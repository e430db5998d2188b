//! Cache controller: one versioned instance of the request-intercepting worker.

use futures::future::try_join_all;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::net::{Network, Request, Response};

use super::channel::{BroadcastChannel, ConnectivityMessage};
use super::keys::{CacheKey, Classifier, RequestKind};
use super::storage::CacheStorage;

/// Generation names for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
  prefix: String,
  version: String,
}

impl CacheNames {
  pub fn new(prefix: &str, version: &str) -> Self {
    Self {
      prefix: prefix.to_string(),
      version: version.to_string(),
    }
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  /// Versioned generation holding the shell assets
  pub fn static_name(&self) -> String {
    format!("{}-static-{}", self.prefix, self.version)
  }

  /// Unversioned generation holding rate-query responses
  pub fn dynamic_name(&self) -> String {
    format!("{}-dynamic", self.prefix)
  }

  /// Generations that survive activation
  pub fn allow_list(&self) -> [String; 2] {
    [self.static_name(), self.dynamic_name()]
  }

  /// Names of the version that owns `generation`, if it is a static
  /// generation with our prefix.
  pub fn version_of(&self, generation: &str) -> Option<CacheNames> {
    let static_prefix = format!("{}-static-", self.prefix);
    generation
      .strip_prefix(&static_prefix)
      .filter(|version| !version.is_empty())
      .map(|version| CacheNames::new(&self.prefix, version))
  }
}

/// Lifecycle of a controller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Failed install or replaced by a newer version
  Redundant,
}

/// Intercepts requests and applies the caching policy of its class.
pub struct CacheController<S: CacheStorage, N: Network> {
  names: CacheNames,
  classifier: Arc<Classifier>,
  storage: Arc<S>,
  network: Arc<N>,
  channel: BroadcastChannel,
  state: Arc<Mutex<WorkerState>>,
}

impl<S: CacheStorage, N: Network> CacheController<S, N> {
  pub fn new(
    names: CacheNames,
    classifier: Arc<Classifier>,
    storage: Arc<S>,
    network: Arc<N>,
    channel: BroadcastChannel,
  ) -> Self {
    Self {
      names,
      classifier,
      storage,
      network,
      channel,
      state: Arc::new(Mutex::new(WorkerState::Parsed)),
    }
  }

  pub fn names(&self) -> &CacheNames {
    &self.names
  }

  pub fn state(&self) -> WorkerState {
    match self.state.lock() {
      Ok(state) => *state,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  pub(super) fn set_state(&self, next: WorkerState) {
    match self.state.lock() {
      Ok(mut state) => *state = next,
      Err(poisoned) => *poisoned.into_inner() = next,
    }
  }

  fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| Error::InvalidState(format!("Lock poisoned: {}", e)))?;
    if *state != from {
      return Err(Error::InvalidState(format!(
        "cannot move {} from {:?} to {:?}",
        self.names.static_name(),
        *state,
        to
      )));
    }
    *state = to;
    Ok(())
  }

  /// Populate the static generation with every shell asset.
  ///
  /// All assets are fetched before anything is written; one failure leaves
  /// no generation behind and makes this instance redundant.
  pub async fn install(&self) -> Result<()> {
    self.transition(WorkerState::Parsed, WorkerState::Installing)?;
    let generation = self.names.static_name();
    info!(
      generation = %generation,
      assets = self.classifier.shell_assets().len(),
      "installing"
    );

    match self.fetch_shell().await {
      Ok(entries) => match self.storage.put_all(&generation, &entries) {
        Ok(()) => {
          self.set_state(WorkerState::Installed);
          info!(generation = %generation, "installed");
          Ok(())
        }
        Err(e) => {
          self.set_state(WorkerState::Redundant);
          Err(e)
        }
      },
      Err(e) => {
        warn!(generation = %generation, error = %e, "install failed");
        self.set_state(WorkerState::Redundant);
        Err(e)
      }
    }
  }

  async fn fetch_shell(&self) -> Result<Vec<(CacheKey, Response)>> {
    let fetches = self.classifier.shell_assets().iter().map(|url| async move {
      let request = Request::get(url.clone());
      let response = self
        .network
        .fetch(&request)
        .await
        .map_err(|e| Error::AssetInstall {
          url: url.to_string(),
          reason: e.to_string(),
        })?;

      if !response.is_success() {
        return Err(Error::AssetInstall {
          url: url.to_string(),
          reason: format!("status {}", response.status),
        });
      }
      Ok((self.classifier.key(&request), response))
    });

    try_join_all(fetches).await
  }

  /// Delete every generation outside this version's allow-list.
  ///
  /// Returns the deleted generation names.
  pub fn activate(&self) -> Result<Vec<String>> {
    self.transition(WorkerState::Installed, WorkerState::Activating)?;
    let allow_list = self.names.allow_list();

    let existing = match self.storage.keys() {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "could not list cache generations, nothing purged");
        Vec::new()
      }
    };

    let mut deleted = Vec::new();
    for name in existing.into_iter().filter(|n| !allow_list.contains(n)) {
      match self.storage.delete(&name) {
        Ok(_) => deleted.push(name),
        Err(e) => warn!(generation = %name, error = %e, "failed to delete old generation"),
      }
    }

    self.set_state(WorkerState::Activated);
    info!(generation = %self.names.static_name(), deleted = ?deleted, "activated");
    Ok(deleted)
  }

  /// Answer a request according to its class.
  ///
  /// A controller that is not active only forwards to the network.
  pub async fn handle_fetch(&self, request: Request) -> Result<Response> {
    if self.state() != WorkerState::Activated {
      return self.network.fetch(&request).await;
    }

    let kind = self.classifier.classify(&request);
    debug!(url = %request.url, kind = ?kind, "intercepted");

    match kind {
      RequestKind::RateQuery => self.rate_query(request).await,
      RequestKind::ShellAsset | RequestKind::Other => self.pass_through(request).await,
    }
  }

  /// Network first; on failure or non-2xx fall back to the dynamic cache
  /// and tell listeners we are offline.
  async fn rate_query(&self, request: Request) -> Result<Response> {
    match self.network.fetch(&request).await {
      Ok(response) if response.is_success() => {
        let key = self.classifier.key(&request);
        let copy = response.clone();
        if let Err(e) = self
          .storage
          .put(&self.names.dynamic_name(), &key, &copy)
        {
          warn!(url = %request.url, error = %e, "failed to cache rate query");
        }
        Ok(response)
      }
      Ok(response) => self.offline_fallback(&request, format!("status {}", response.status)),
      Err(e) => self.offline_fallback(&request, e.to_string()),
    }
  }

  fn offline_fallback(&self, request: &Request, reason: String) -> Result<Response> {
    debug!(
      url = %request.url,
      reason = %reason,
      channel = self.channel.name(),
      "rate query offline"
    );
    self.channel.post(ConnectivityMessage::offline());

    let key = self.classifier.key(request);
    match self.storage.match_query(&self.names.dynamic_name(), &key) {
      Ok(Some(cached)) => Ok(cached),
      Ok(None) => Err(Error::Offline(reason)),
      Err(e) => {
        warn!(error = %e, "dynamic cache lookup failed");
        Err(Error::Offline(reason))
      }
    }
  }

  /// Serve an exact cached match, otherwise go to the network uncached.
  async fn pass_through(&self, request: Request) -> Result<Response> {
    let key = self.classifier.key(&request);
    match self.storage.match_request(&key) {
      Ok(Some(cached)) => return Ok(cached),
      Ok(None) => {}
      Err(e) => warn!(url = %request.url, error = %e, "cache lookup failed"),
    }
    self.network.fetch(&request).await
  }
}

impl<S: CacheStorage, N: Network> Clone for CacheController<S, N> {
  fn clone(&self) -> Self {
    Self {
      names: self.names.clone(),
      classifier: Arc::clone(&self.classifier),
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      channel: self.channel.clone(),
      state: Arc::clone(&self.state),
    }
  }
}
