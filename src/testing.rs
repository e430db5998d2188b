//! Test doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::net::{Network, Request, Response};
use crate::rates::Conversion;
use crate::reconcile::{ConversionView, Freshness};
use crate::store::{LocalStore, Record};

/// Ordered log shared between fakes, to assert on interleavings.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
  pub fn push(&self, entry: String) {
    self.0.lock().unwrap().push(entry);
  }

  pub fn entries(&self) -> Vec<String> {
    self.0.lock().unwrap().clone()
  }
}

#[derive(Clone)]
struct Route {
  status: u16,
  body: String,
  date: Option<String>,
  gate: Option<Arc<Notify>>,
}

/// Scripted network. Unknown URLs fail like a dropped connection.
#[derive(Default)]
pub struct FakeNetwork {
  routes: Mutex<HashMap<String, Route>>,
  queued: Mutex<HashMap<String, VecDeque<Route>>>,
  offline: AtomicBool,
  journal: Journal,
}

impl FakeNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_journal(journal: Journal) -> Self {
    Self {
      journal,
      ..Self::default()
    }
  }

  /// Answer every request for `url` with `status` and `body`.
  pub fn respond(&self, url: &str, status: u16, body: &str) {
    self.offline.store(false, Ordering::SeqCst);
    self.routes.lock().unwrap().insert(
      url.to_string(),
      Route {
        status,
        body: body.to_string(),
        date: None,
        gate: None,
      },
    );
  }

  pub fn respond_json(&self, url: &str, body: &str) {
    self.respond(url, 200, body);
  }

  /// Like `respond_json`, with a `Date` header.
  pub fn respond_dated(&self, url: &str, body: &str, date: &str) {
    self.respond_json(url, body);
    if let Some(route) = self.routes.lock().unwrap().get_mut(url) {
      route.date = Some(date.to_string());
    }
  }

  /// Answer the next request for `url` only once the returned gate is
  /// notified. Queued answers are used before the standing one.
  pub fn gated(&self, url: &str, body: &str) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    self
      .queued
      .lock()
      .unwrap()
      .entry(url.to_string())
      .or_default()
      .push_back(Route {
        status: 200,
        body: body.to_string(),
        date: None,
        gate: Some(Arc::clone(&gate)),
      });
    gate
  }

  /// Fail every request from now on, until the next `respond`.
  pub fn go_offline(&self) {
    self.offline.store(true, Ordering::SeqCst);
  }

  fn route(&self, url: &str) -> Option<Route> {
    let queued = self
      .queued
      .lock()
      .unwrap()
      .get_mut(url)
      .and_then(|q| q.pop_front());
    queued.or_else(|| self.routes.lock().unwrap().get(url).cloned())
  }
}

impl Network for FakeNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = request.url.to_string();
    self.journal.push(format!("fetch {}", url));

    if self.offline.load(Ordering::SeqCst) {
      return Err(Error::Network("connection refused".into()));
    }
    let route = self
      .route(&url)
      .ok_or_else(|| Error::Network(format!("no route to {}", url)))?;

    if let Some(gate) = route.gate {
      gate.notified().await;
    }

    let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
    if let Some(date) = route.date {
      headers.push(("date".to_string(), date));
    }

    Ok(Response {
      url,
      status: route.status,
      headers,
      body: route.body.into_bytes(),
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
  Show {
    id: String,
    freshness: Freshness,
    amount: f64,
    dc: f64,
  },
  Remove(String),
}

/// View that records what it was asked to display.
#[derive(Clone, Default)]
pub struct RecordingView {
  events: Arc<Mutex<Vec<ViewEvent>>>,
  journal: Journal,
}

impl RecordingView {
  pub fn with_journal(journal: Journal) -> Self {
    Self {
      journal,
      ..Self::default()
    }
  }

  pub fn events(&self) -> Vec<ViewEvent> {
    self.events.lock().unwrap().clone()
  }
}

impl ConversionView for RecordingView {
  fn show(&self, conversion: &Conversion, freshness: Freshness) {
    self
      .journal
      .push(format!("show {} {:?}", conversion.id, freshness));
    self.events.lock().unwrap().push(ViewEvent::Show {
      id: conversion.id.clone(),
      freshness,
      amount: conversion.amount,
      dc: conversion.dc,
    });
  }

  fn remove(&self, id: &str) {
    self.journal.push(format!("remove {}", id));
    self.events.lock().unwrap().push(ViewEvent::Remove(id.to_string()));
  }
}

/// A store whose backing storage is gone.
pub struct UnavailableStore;

impl LocalStore for UnavailableStore {
  fn put<T: Record>(&self, _record: &T) -> Result<()> {
    Err(Error::StorageUnavailable("disk detached".into()))
  }

  fn put_all<T: Record>(&self, _records: &[T]) -> Result<()> {
    Err(Error::StorageUnavailable("disk detached".into()))
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    Err(Error::StorageUnavailable("disk detached".into()))
  }

  fn get<T: Record>(&self, _id: &str) -> Result<Option<T>> {
    Err(Error::StorageUnavailable("disk detached".into()))
  }

  fn delete<T: Record>(&self, _id: &str) -> Result<bool> {
    Err(Error::StorageUnavailable("disk detached".into()))
  }
}
