use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::cache::{
  BroadcastChannel, CacheNames, Classifier, ConnectivityMessage, Registration, ServiceWorker,
  SqliteCacheStorage, WorkerHandle, WorkerMessage, SW_MESSAGES,
};
use crate::config::Config;
use crate::error::Error;
use crate::net::HttpNetwork;
use crate::rates::{RatePair, RatesClient};
use crate::reconcile::Coordinator;
use crate::store::SqliteStore;
use crate::ui::{self, TerminalView};

/// What to do in this run
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
  /// Convert an amount between two currencies with live rates
  Convert {
    /// Source currency code, e.g. USD
    from: String,
    /// Target currency code, e.g. EUR
    to: String,
    /// Amount in the source currency
    #[arg(default_value_t = 1.0, allow_negative_numbers = true)]
    amount: f64,
  },
  /// Show saved conversions, then refresh their rates
  List,
  /// Forget a saved conversion, e.g. USD_EUR
  Delete { id: String },
  /// List the currencies the provider knows
  Currencies,
  /// Switch to a newly installed version right away
  Update,
}

/// Main application state
pub struct App {
  worker: ServiceWorker,
  coordinator: Coordinator<SqliteStore, WorkerHandle, TerminalView>,
  /// Subscription to the `sw-messages` channel
  advisories: broadcast::Receiver<ConnectivityMessage>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let data_dir = config.data_dir()?;
    let endpoints = config.endpoints()?;

    let store = open_or_memory(
      "local store",
      &data_dir.join("store.db"),
      SqliteStore::open,
      SqliteStore::open_in_memory,
    )?;
    let cache = open_or_memory(
      "cache",
      &data_dir.join("cache.db"),
      SqliteCacheStorage::open,
      SqliteCacheStorage::open_in_memory,
    )?;

    let network = HttpNetwork::new(endpoints.base(), Config::api_key())?;
    let channel = BroadcastChannel::new(SW_MESSAGES);
    let advisories = channel.subscribe();

    let registration = Registration::new(
      CacheNames::new(&config.cache.prefix, &config.cache.version),
      Classifier::new(endpoints.convert(), config.shell_asset_urls()?),
      Arc::new(cache),
      Arc::new(network),
      channel,
    );
    let worker = ServiceWorker::spawn(registration);

    let fetcher = RatesClient::new(worker.handle(), endpoints);
    let coordinator = Coordinator::new(store, fetcher, TerminalView);

    Ok(Self {
      worker,
      coordinator,
      advisories,
    })
  }

  pub async fn run(mut self, command: Command) -> Result<()> {
    let outcome = self.worker.registered().await?;
    if let Some(notice) = ui::registration_notice(&outcome) {
      println!("{}", notice);
    }

    let result = self.execute(command).await;

    if self.drain_advisories() {
      println!("{}", ui::OFFLINE_NOTICE);
    }

    let version = self.worker.shutdown().await?;
    info!(version = ?version, "worker stopped");

    result
  }

  async fn execute(&self, command: Command) -> Result<()> {
    match command {
      Command::Convert { from, to, amount } => {
        let pair = RatePair::new(&from, &to)?;
        match self.coordinator.convert(&pair, amount).await {
          Ok(conversion) => info!(id = %conversion.id, "converted"),
          Err(e) if e.is_connectivity() => {
            warn!(pair = %pair.id(), error = %e, "no rates available");
            println!("No rates for {} available offline.", pair.id());
          }
          Err(e) => return Err(e.into()),
        }
      }
      Command::List => match self.coordinator.load_and_refresh().await {
        Ok(summary) => info!(?summary, "refresh finished"),
        Err(Error::EmptyStore(_)) => {
          println!("No saved conversions yet. Try `convter convert USD EUR 100`.")
        }
        Err(e) => return Err(e.into()),
      },
      Command::Delete { id } => {
        if !self.coordinator.delete_conversion(&id.to_uppercase()) {
          println!("Nothing saved under {}", id);
        }
      }
      Command::Currencies => {
        let currencies = self.coordinator.currencies().await?;
        println!("{}", ui::render_currencies(&currencies));
      }
      Command::Update => {
        self.worker.handle().post_message(WorkerMessage::SkipWaiting)?;
      }
    }
    Ok(())
  }

  /// Whether any offline notice arrived during this run
  fn drain_advisories(&mut self) -> bool {
    let mut offline = false;
    loop {
      match self.advisories.try_recv() {
        Ok(message) => offline |= message.is_offline,
        Err(TryRecvError::Lagged(_)) => offline = true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    offline
  }
}

/// Open a database file, falling back to an in-memory one for this run.
fn open_or_memory<T>(
  what: &str,
  path: &Path,
  open: impl FnOnce(&Path) -> crate::error::Result<T>,
  in_memory: impl FnOnce() -> crate::error::Result<T>,
) -> Result<T> {
  match open(path) {
    Ok(db) => Ok(db),
    Err(e) => {
      warn!(what, path = %path.display(), error = %e, "falling back to in-memory storage");
      in_memory().map_err(|e| eyre!("Could not open {}: {}", what, e))
    }
  }
}
