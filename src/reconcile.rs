//! Reconciliation between the local store, the rates client and the view.
//!
//! Saved conversions are shown first and refreshed afterwards
//! (stale-while-revalidate). Every fetch the coordinator starts gets a
//! per-pair ticket; a result whose ticket is no longer the latest for its
//! pair is dropped, so a slow response cannot overwrite a newer one.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::net::Network;
use crate::rates::{normalize_amount, Conversion, Currency, RatePair, RatesClient};
use crate::store::LocalStore;

/// How current a displayed conversion is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  /// As saved earlier; rates may be old
  Saved,
  /// Just fetched from the rate provider (or its cache)
  Fresh,
}

/// Whatever displays conversions to the user.
pub trait ConversionView: Send + Sync {
  fn show(&self, conversion: &Conversion, freshness: Freshness);
  fn remove(&self, id: &str);
}

/// Counts from one `load_and_refresh` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
  pub shown: usize,
  pub refreshed: usize,
  /// Kept as saved because the refresh failed or was superseded
  pub stale: usize,
}

#[derive(Default)]
struct WorkingSet {
  conversions: Vec<Conversion>,
  latest: HashMap<String, u64>,
  next_ticket: u64,
}

impl WorkingSet {
  fn get(&self, id: &str) -> Option<&Conversion> {
    self.conversions.iter().find(|c| c.id == id)
  }

  fn upsert(&mut self, conversion: Conversion) {
    match self.conversions.iter_mut().find(|c| c.id == conversion.id) {
      Some(existing) => *existing = conversion,
      None => self.conversions.push(conversion),
    }
  }

  fn remove(&mut self, id: &str) -> bool {
    let before = self.conversions.len();
    self.conversions.retain(|c| c.id != id);
    self.conversions.len() != before
  }

  /// Issue a ticket, invalidating every earlier one for `id`.
  fn ticket(&mut self, id: &str) -> u64 {
    self.next_ticket += 1;
    self.latest.insert(id.to_string(), self.next_ticket);
    self.next_ticket
  }

  fn is_latest(&self, id: &str, ticket: u64) -> bool {
    self.latest.get(id) == Some(&ticket)
  }
}

/// Owns the in-memory working set of conversions and keeps the store and
/// the view in step with it.
pub struct Coordinator<S: LocalStore, N: Network, V: ConversionView> {
  store: S,
  fetcher: RatesClient<N>,
  view: V,
  working: Mutex<WorkingSet>,
}

impl<S: LocalStore, N: Network, V: ConversionView> Coordinator<S, N, V> {
  pub fn new(store: S, fetcher: RatesClient<N>, view: V) -> Self {
    Self {
      store,
      fetcher,
      view,
      working: Mutex::new(WorkingSet::default()),
    }
  }

  fn working(&self) -> MutexGuard<'_, WorkingSet> {
    match self.working.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// Snapshot of the working set
  #[cfg(test)]
  pub fn conversions(&self) -> Vec<Conversion> {
    self.working().conversions.clone()
  }

  /// Show every saved conversion, then refresh them all concurrently.
  ///
  /// Fails with `Error::EmptyStore` when nothing was saved. A failed
  /// refresh leaves the saved record in place without reporting it.
  pub async fn load_and_refresh(&self) -> Result<RefreshSummary> {
    let saved: Vec<Conversion> = self.store.get_all().unwrap_or_else(|e| {
      warn!(error = %e, "could not read saved conversions");
      Vec::new()
    });

    if saved.is_empty() {
      return Err(Error::EmptyStore("conversions"));
    }

    let tickets: Vec<(Conversion, u64)> = {
      let mut working = self.working();
      saved
        .into_iter()
        .map(|conversion| {
          working.upsert(conversion.clone());
          let ticket = working.ticket(&conversion.id);
          (conversion, ticket)
        })
        .collect()
    };

    // Everything on screen before the first request goes out
    for (conversion, _) in &tickets {
      self.view.show(conversion, Freshness::Saved);
    }

    let mut summary = RefreshSummary {
      shown: tickets.len(),
      ..RefreshSummary::default()
    };

    let mut refreshes: FuturesUnordered<_> = tickets
      .into_iter()
      .map(|(saved, ticket)| async move {
        let result = self
          .fetcher
          .fetch_conversion(&saved.pair(), saved.amount)
          .await;
        (saved, ticket, result)
      })
      .collect();

    while let Some((saved, ticket, result)) = refreshes.next().await {
      match result {
        Ok(fresh) => {
          if self.apply(ticket, &fresh) {
            summary.refreshed += 1;
          } else {
            summary.stale += 1;
          }
        }
        Err(e) => {
          debug!(id = %saved.id, error = %e, "refresh failed, keeping saved conversion");
          summary.stale += 1;
        }
      }
    }

    Ok(summary)
  }

  /// Upsert `conversion` into the working set and persist it.
  ///
  /// Any fetch still in flight for the same pair is superseded.
  pub fn record_conversion(&self, conversion: Conversion) {
    self.commit(&conversion, None);
  }

  /// Convert `amount` along `pair` with live rates.
  ///
  /// A pair known to the working set or the store is shown right away with
  /// the new amount and its previous rates, then updated once the fetch
  /// completes.
  pub async fn convert(&self, pair: &RatePair, amount: f64) -> Result<Conversion> {
    let amount = normalize_amount(amount)?;
    let id = pair.id();

    let known = self.working().get(&id).cloned().or_else(|| self.saved(&id));
    if let Some(mut provisional) = known {
      provisional.amount = amount;
      self.record_conversion(provisional.clone());
      self.view.show(&provisional, Freshness::Saved);
    }
    let ticket = self.working().ticket(&id);

    let fresh = self.fetcher.fetch_conversion(pair, amount).await?;
    if self.apply(ticket, &fresh) {
      return Ok(fresh);
    }

    // A newer request for this pair won; report what is current
    Ok(self.working().get(&id).cloned().unwrap_or(fresh))
  }

  /// Remove a conversion everywhere. Unknown ids are a no-op.
  pub fn delete_conversion(&self, id: &str) -> bool {
    let removed = {
      let mut working = self.working();
      working.ticket(id);
      working.remove(id)
    };
    if removed {
      self.view.remove(id);
    }

    match self.store.delete::<Conversion>(id) {
      Ok(deleted) => removed || deleted,
      Err(e) => {
        warn!(id, error = %e, "could not delete saved conversion");
        removed
      }
    }
  }

  /// Currency list, from the store when present, else from the network
  /// (and then saved).
  pub async fn currencies(&self) -> Result<Vec<Currency>> {
    match self.store.get_all::<Currency>() {
      Ok(currencies) if !currencies.is_empty() => return Ok(currencies),
      Ok(_) => debug!("no currencies saved yet"),
      Err(e) => warn!(error = %e, "could not read saved currencies"),
    }

    let currencies = self.fetcher.fetch_currencies().await?;
    if let Err(e) = self.store.put_all(&currencies) {
      warn!(error = %e, "could not save currencies");
    }
    Ok(currencies)
  }

  /// Commit a fetched conversion if `ticket` is still current for its pair.
  fn apply(&self, ticket: u64, conversion: &Conversion) -> bool {
    if !self.commit(conversion, Some(ticket)) {
      debug!(id = %conversion.id, "discarding superseded result");
      return false;
    }
    self.view.show(conversion, Freshness::Fresh);
    true
  }

  /// Upsert into the working set and the store.
  ///
  /// With a ticket, only if it is still the latest for the pair; without
  /// one, every earlier ticket is invalidated.
  fn commit(&self, conversion: &Conversion, ticket: Option<u64>) -> bool {
    {
      let mut working = self.working();
      match ticket {
        Some(ticket) if !working.is_latest(&conversion.id, ticket) => return false,
        Some(_) => {}
        None => {
          working.ticket(&conversion.id);
        }
      }
      working.upsert(conversion.clone());
    }
    self.persist(conversion);
    true
  }

  /// Saved record for `id`; an unreadable store counts as none.
  fn saved(&self, id: &str) -> Option<Conversion> {
    self.store.get(id).unwrap_or_else(|e| {
      warn!(id, error = %e, "could not read saved conversion");
      None
    })
  }

  fn persist(&self, conversion: &Conversion) {
    if let Err(e) = self.store.put(conversion) {
      warn!(id = %conversion.id, error = %e, "could not save conversion");
    }
  }
}
