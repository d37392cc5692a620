//! Test doubles for the network and storage seams.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::error::{FetchError, FetchErrorKind, StoreError};
use super::network::Fetch;
use super::key::RequestKey;
use super::storage::{CacheStorage, CacheStore, MemoryStorage, MemoryStore};
use super::traits::{CachedEntry, GatewayRequest, StoredResponse};

type Route = Result<StoredResponse, FetchErrorKind>;

#[derive(Default)]
struct MockState {
  routes: Mutex<HashMap<String, Route>>,
  calls: AtomicUsize,
  yielding: AtomicBool,
}

/// Network stand-in that serves canned responses by URL and counts calls.
/// Unknown URLs fail as connection refused.
#[derive(Clone, Default)]
pub struct MockNetwork {
  state: Arc<MockState>,
}

impl MockNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, url: &str, response: StoredResponse) -> Self {
    self.route(url, Ok(response))
  }

  pub fn fail(self, url: &str, kind: FetchErrorKind) -> Self {
    self.route(url, Err(kind))
  }

  /// Yield to the scheduler once inside every fetch.
  pub fn yielding(self) -> Self {
    self.state.yielding.store(true, Ordering::SeqCst);
    self
  }

  pub fn calls(&self) -> usize {
    self.state.calls.load(Ordering::SeqCst)
  }

  fn route(self, url: &str, route: Route) -> Self {
    self
      .state
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), route);
    self
  }
}

impl Fetch for MockNetwork {
  fn fetch(&self, request: GatewayRequest) -> BoxFuture<'static, Result<StoredResponse, FetchError>> {
    let state = Arc::clone(&self.state);

    async move {
      state.calls.fetch_add(1, Ordering::SeqCst);
      if state.yielding.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
      }

      let route = state.routes.lock().unwrap().get(request.url.as_str()).cloned();
      match route {
        Some(Ok(response)) => Ok(response),
        Some(Err(kind)) => Err(FetchError::new(kind, "mock failure")),
        None => Err(FetchError::new(FetchErrorKind::Connect, "connection refused")),
      }
    }
    .boxed()
  }
}

/// Storage whose stores can never be opened.
pub struct UnavailableStorage;

impl CacheStorage for UnavailableStorage {
  type Store = MemoryStore;

  fn open(&self, _name: &str) -> Result<MemoryStore, StoreError> {
    Err(StoreError::Io(std::io::Error::new(
      std::io::ErrorKind::PermissionDenied,
      "read-only filesystem",
    )))
  }
}

/// Storage that opens fine but whose stores fail reads or writes.
pub struct FaultyStorage {
  inner: MemoryStorage,
  fail_get: bool,
  fail_put: bool,
}

impl FaultyStorage {
  pub fn failing_get() -> Self {
    Self {
      inner: MemoryStorage::new(),
      fail_get: true,
      fail_put: false,
    }
  }

  pub fn failing_put() -> Self {
    Self {
      inner: MemoryStorage::new(),
      fail_get: false,
      fail_put: true,
    }
  }
}

impl CacheStorage for FaultyStorage {
  type Store = FaultyStore;

  fn open(&self, name: &str) -> Result<FaultyStore, StoreError> {
    Ok(FaultyStore {
      inner: self.inner.open(name)?,
      fail_get: self.fail_get,
      fail_put: self.fail_put,
    })
  }
}

pub struct FaultyStore {
  inner: MemoryStore,
  fail_get: bool,
  fail_put: bool,
}

impl CacheStore for FaultyStore {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn get(&self, key: &RequestKey) -> Result<Option<CachedEntry>, StoreError> {
    if self.fail_get {
      return Err(StoreError::Poisoned);
    }
    self.inner.get(key)
  }

  fn put(
    &self,
    key: &RequestKey,
    response: &StoredResponse,
    vary: &[(String, String)],
  ) -> Result<(), StoreError> {
    if self.fail_put {
      return Err(StoreError::Poisoned);
    }
    self.inner.put(key, response, vary)
  }
}
