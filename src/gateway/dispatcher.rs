//! Host-side dispatcher that routes outbound requests through an interceptor.

use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use super::error::GatewayError;
use super::layer::Gateway;
use super::network::Fetch;
use super::storage::CacheStorage;
use super::traits::{GatewayRequest, GatewayResponse};

/// Lifecycle of the registered interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Nothing registered; requests go straight to the network
  Unregistered,
  /// Registered but the install event has not been delivered yet
  Installing,
  /// Installed, waiting for existing sessions to end before taking over
  Waiting,
  /// Every request is offered to the interceptor
  Active,
}

/// Delivered to an interceptor when it is installed.
#[derive(Default)]
pub struct InstallEvent {
  skip_waiting: bool,
  pending: Vec<BoxFuture<'static, ()>>,
}

impl InstallEvent {
  /// Take control as soon as installation completes instead of waiting for
  /// existing sessions to close.
  pub fn skip_waiting(&mut self) {
    self.skip_waiting = true;
  }

  /// Install-time work to run once the new state has been applied.
  pub fn wait_until(&mut self, work: impl Future<Output = ()> + Send + 'static) {
    self.pending.push(work.boxed());
  }
}

/// Handler registered against a [`Dispatcher`].
pub trait Interceptor: Send + Sync + 'static {
  fn on_install(&self, event: &mut InstallEvent);

  fn on_fetch(
    &self,
    request: GatewayRequest,
  ) -> BoxFuture<'static, Result<GatewayResponse, GatewayError>>;
}

impl<S, F> Interceptor for Gateway<S, F>
where
  S: CacheStorage + 'static,
  F: Fetch,
{
  fn on_install(&self, event: &mut InstallEvent) {
    // No gradual rollover: the new gateway serves the very next request
    event.skip_waiting();
    info!(cache = %self.cache_name(), "Gateway installed, taking control immediately");

    if self.has_precache() {
      let gateway = self.clone();
      event.wait_until(async move {
        gateway.precache().await;
      });
    }
  }

  fn on_fetch(
    &self,
    request: GatewayRequest,
  ) -> BoxFuture<'static, Result<GatewayResponse, GatewayError>> {
    let gateway = self.clone();
    async move { gateway.handle(request).await }.boxed()
  }
}

/// Stands in for the host environment: owns the network and decides whether
/// an outbound request is offered to the interceptor or sent directly.
pub struct Dispatcher<F: Fetch> {
  network: Arc<F>,
  interceptor: Option<Arc<dyn Interceptor>>,
  state: Mutex<WorkerState>,
}

impl<F: Fetch> Dispatcher<F> {
  pub fn new(network: F) -> Self {
    Self {
      network: Arc::new(network),
      interceptor: None,
      state: Mutex::new(WorkerState::Unregistered),
    }
  }

  /// Register an interceptor, replacing any previous one. It does not see
  /// requests until it has been installed.
  pub fn register(&mut self, interceptor: impl Interceptor) {
    self.interceptor = Some(Arc::new(interceptor));
    self.set_state(WorkerState::Installing);
  }

  pub fn state(&self) -> WorkerState {
    *self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn set_state(&self, state: WorkerState) {
    *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
  }

  /// Deliver the install event.
  ///
  /// The resulting state is applied before any `wait_until` work runs, so an
  /// interceptor that skipped waiting already receives requests dispatched
  /// while that work is in progress.
  pub async fn install(&self) -> Result<WorkerState, GatewayError> {
    let interceptor = self
      .interceptor
      .as_ref()
      .ok_or_else(|| GatewayError::Internal("no interceptor registered".to_string()))?;

    let mut event = InstallEvent::default();
    interceptor.on_install(&mut event);

    let state = if event.skip_waiting {
      WorkerState::Active
    } else {
      WorkerState::Waiting
    };
    self.set_state(state);
    info!(state = ?state, "Interceptor installed");

    future::join_all(event.pending).await;
    Ok(state)
  }

  /// Promote a waiting interceptor once the sessions it was waiting on are
  /// gone.
  #[allow(dead_code)]
  pub fn release_clients(&self) {
    if self.state() == WorkerState::Waiting {
      self.set_state(WorkerState::Active);
      info!("Waiting interceptor activated");
    }
  }

  /// Send one outbound request.
  ///
  /// With an active interceptor the request runs as its own task; dropping
  /// the returned future does not cancel it, so its cache write may or may
  /// not land. Otherwise the request goes straight to the network.
  pub async fn dispatch(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
    match (&self.interceptor, self.state()) {
      (Some(interceptor), WorkerState::Active) => {
        let task = tokio::spawn(interceptor.on_fetch(request));
        task.await.map_err(|e| {
          error!(error = %e, "Fetch handler task failed");
          GatewayError::Internal(format!("fetch handler task failed: {}", e))
        })?
      }
      _ => {
        debug!(request = %request.describe(), "No active interceptor, sending directly");
        let description = request.describe();
        self
          .network
          .fetch(request)
          .await
          .map(GatewayResponse::bypass)
          .map_err(|source| {
            error!(request = %description, error = %source, "Direct request failed");
            GatewayError::Network {
              request: description,
              source,
            }
          })
      }
    }
  }
}
