//! Cache-first request handling.

use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

use super::error::GatewayError;
use super::key::RequestKey;
use super::network::Fetch;
use super::storage::{CacheStorage, CacheStore};
use super::traits::{GatewayRequest, GatewayResponse, StoredResponse};

/// The offline cache gateway.
///
/// Sits between the application and the network: a request whose identity
/// is already in the active store is answered from there, anything else is
/// fetched and written back for next time. Stored entries are never
/// revalidated or expired; the only way to drop them is to switch to a new
/// store name.
pub struct Gateway<S: CacheStorage, F: Fetch> {
  storage: Arc<S>,
  network: Arc<F>,
  cache_name: Arc<str>,
  /// Request headers that take part in the cache key
  vary_headers: Arc<Vec<String>>,
  /// URLs fetched into the store at install time
  precache: Arc<Vec<Url>>,
}

impl<S: CacheStorage, F: Fetch> Gateway<S, F> {
  pub fn new(storage: S, network: F, cache_name: &str) -> Self {
    Self {
      storage: Arc::new(storage),
      network: Arc::new(network),
      cache_name: Arc::from(cache_name),
      vary_headers: Arc::new(Vec::new()),
      precache: Arc::new(Vec::new()),
    }
  }

  pub fn with_vary_headers(mut self, vary_headers: Vec<String>) -> Self {
    self.vary_headers = Arc::new(vary_headers);
    self
  }

  pub fn with_precache(mut self, urls: Vec<Url>) -> Self {
    self.precache = Arc::new(urls);
    self
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  pub(crate) fn has_precache(&self) -> bool {
    !self.precache.is_empty()
  }

  /// Answer one intercepted request.
  ///
  /// 1. Open the named store
  /// 2. On a hit, return the stored response as is
  /// 3. On a miss, fetch, store a copy and return the other
  ///
  /// Every failure propagates to the caller and is logged.
  pub async fn handle(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
    let description = request.describe();
    let result = self.respond(request).await;

    if let Err(err) = &result {
      error!(request = %description, error = %err, "Error in fetch handler");
    }
    result
  }

  async fn respond(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
    let store = self
      .storage
      .open(&self.cache_name)
      .map_err(|source| GatewayError::StoreOpen {
        name: self.cache_name.to_string(),
        source,
      })?;

    // Only GET requests are matched against or written to the store
    if request.method != Method::GET {
      debug!(request = %request.describe(), "Not cacheable, passing through");
      let response = self.fetch(request).await?;
      return Ok(GatewayResponse::uncached(response));
    }

    let key = RequestKey::from_request(&request, &self.vary_headers);

    let cached = store.get(&key).map_err(|source| GatewayError::Store {
      name: store.name().to_string(),
      source,
    })?;
    match cached {
      Some(entry) if entry.matches(&request) => {
        debug!(request = %key.description(), cached_at = %entry.cached_at, "Cache hit");
        return Ok(GatewayResponse::from_cache(entry.response, entry.cached_at));
      }
      Some(_) => debug!(request = %key.description(), "Stored variant differs, fetching"),
      None => debug!(request = %key.description(), "Cache miss, fetching"),
    }

    let response = self.fetch(request.clone()).await?;

    if !response.is_storable() {
      debug!(
        request = %key.description(),
        status = response.status,
        "Response not storable"
      );
      return Ok(GatewayResponse::uncached(response));
    }

    // The store keeps its own copy; the caller gets this one
    let vary = response.vary_snapshot(&request);
    store
      .put(&key, &response, &vary)
      .map_err(|source| GatewayError::Store {
        name: store.name().to_string(),
        source,
      })?;

    Ok(GatewayResponse::from_network(response))
  }

  async fn fetch(&self, request: GatewayRequest) -> Result<StoredResponse, GatewayError> {
    let description = request.describe();
    self
      .network
      .fetch(request)
      .await
      .map_err(|source| GatewayError::Network {
        request: description,
        source,
      })
  }

  /// Fetch every precache URL through the gateway. Failures are logged and
  /// skipped. Returns how many URLs are now available from the store.
  pub async fn precache(&self) -> usize {
    let mut cached = 0;

    for url in self.precache.iter() {
      match self.handle(GatewayRequest::get(url.clone())).await {
        Ok(response) => {
          debug!(url = %url, source = ?response.source, "Precached");
          cached += 1;
        }
        // Already logged by handle
        Err(_) => debug!(url = %url, "Skipping precache entry"),
      }
    }

    info!(
      cache = %self.cache_name,
      cached,
      total = self.precache.len(),
      "Precache finished"
    );
    cached
  }
}

impl<S: CacheStorage, F: Fetch> Clone for Gateway<S, F> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      cache_name: Arc::clone(&self.cache_name),
      vary_headers: Arc::clone(&self.vary_headers),
      precache: Arc::clone(&self.precache),
    }
  }
}
