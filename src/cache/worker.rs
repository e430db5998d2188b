//! Background task hosting the registration and its event queue.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::net::{Network, Request, Response};

use super::channel::WorkerMessage;
use super::registration::{Registration, RegistrationOutcome};
use super::storage::CacheStorage;

/// Events processed by the worker task
#[derive(Debug)]
enum WorkerEvent {
  /// A request to intercept
  Fetch {
    request: Request,
    reply: oneshot::Sender<Result<Response>>,
  },
  /// A control message from the foreground
  Message(WorkerMessage),
  /// Stop after everything queued before this
  Terminate,
}

/// Foreground handle to the worker.
///
/// Implements `Network`, so any client built on it has its requests
/// intercepted by the active cache controller.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
  /// Post a control message. Fire-and-forget.
  pub fn post_message(&self, message: WorkerMessage) -> Result<()> {
    self
      .tx
      .send(WorkerEvent::Message(message))
      .map_err(|_| Error::WorkerGone)
  }
}

impl Network for WorkerHandle {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(WorkerEvent::Fetch {
        request: request.clone(),
        reply,
      })
      .map_err(|_| Error::WorkerGone)?;

    rx.await.map_err(|_| Error::WorkerGone)?
  }
}

/// A running worker.
pub struct ServiceWorker {
  handle: WorkerHandle,
  registered: Option<oneshot::Receiver<RegistrationOutcome>>,
  task: JoinHandle<Option<String>>,
}

impl ServiceWorker {
  /// Spawn the worker; registration starts immediately and events queue
  /// up behind it.
  pub fn spawn<S, N>(registration: Registration<S, N>) -> Self
  where
    S: CacheStorage + 'static,
    N: Network + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();

    let task = tokio::spawn(run(registration, rx, outcome_tx));

    Self {
      handle: WorkerHandle { tx },
      registered: Some(outcome_rx),
      task,
    }
  }

  pub fn handle(&self) -> WorkerHandle {
    self.handle.clone()
  }

  /// Wait for registration to finish. Only the first call gets the outcome.
  pub async fn registered(&mut self) -> Result<RegistrationOutcome> {
    let rx = self.registered.take().ok_or(Error::WorkerGone)?;
    rx.await.map_err(|_| Error::WorkerGone)
  }

  /// Drain the queue and stop. Returns the version that was serving.
  pub async fn shutdown(self) -> Result<Option<String>> {
    // Already-stopped workers just report their final state
    let _ = self.handle.tx.send(WorkerEvent::Terminate);
    self.task.await.map_err(|_| Error::WorkerGone)
  }
}

async fn run<S, N>(
  mut registration: Registration<S, N>,
  mut rx: mpsc::UnboundedReceiver<WorkerEvent>,
  outcome_tx: oneshot::Sender<RegistrationOutcome>,
) -> Option<String>
where
  S: CacheStorage + 'static,
  N: Network + 'static,
{
  let outcome = registration.register().await;
  info!(outcome = ?outcome, "registration finished");
  let _ = outcome_tx.send(outcome);

  while let Some(event) = rx.recv().await {
    match event {
      WorkerEvent::Fetch { request, reply } => {
        let controller = registration.active().cloned();
        let network = registration.network();

        // Each fetch runs on its own so a slow request never blocks the queue
        tokio::spawn(async move {
          let result = match controller {
            Some(controller) => controller.handle_fetch(request).await,
            None => network.fetch(&request).await,
          };
          let _ = reply.send(result);
        });
      }
      WorkerEvent::Message(WorkerMessage::SkipWaiting) => match registration.skip_waiting() {
        Ok(true) => info!(version = ?registration.active_version(), "skipped waiting"),
        Ok(false) => debug!("skip waiting: nothing waiting"),
        Err(e) => warn!(error = %e, "skip waiting failed"),
      },
      WorkerEvent::Terminate => break,
    }
  }

  registration.active_version()
}
