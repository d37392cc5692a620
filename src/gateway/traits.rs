//! Core types shared by the gateway, its stores and its network backend.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// An outbound request offered to the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
  pub method: Method,
  pub url: Url,
  /// Header name/value pairs in the order they were given
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl GatewayRequest {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      headers: Vec::new(),
      body: None,
    }
  }

  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = Some(body.into());
    self
  }

  /// Case-insensitive header lookup (first match wins).
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Short human-readable form used in logs and errors.
  pub fn describe(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}

/// A response snapshot: status, headers and the complete body.
///
/// Bodies are fully buffered, so the copy handed to the store and the copy
/// handed back to the caller are independent values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl StoredResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Whether this response may be written to a cache store.
  ///
  /// Partial content and `Vary: *` responses are handed to the caller but
  /// never stored.
  pub fn is_storable(&self) -> bool {
    if self.status == 206 {
      return false;
    }
    !matches!(self.header("vary"), Some(v) if v.trim() == "*")
  }

  /// Lowercased header names listed in this response's `Vary` header.
  pub fn vary_names(&self) -> Vec<String> {
    self
      .header("vary")
      .map(|v| {
        v.split(',')
          .map(|name| name.trim().to_ascii_lowercase())
          .filter(|name| !name.is_empty() && name != "*")
          .collect()
      })
      .unwrap_or_default()
  }

  /// The request's values for every header named in `Vary`, to be saved
  /// alongside the stored response. Absent headers are recorded as empty.
  pub fn vary_snapshot(&self, request: &GatewayRequest) -> Vec<(String, String)> {
    self
      .vary_names()
      .into_iter()
      .map(|name| {
        let value = request.header(&name).map(str::trim).unwrap_or("").to_string();
        (name, value)
      })
      .collect()
  }
}

/// A response as read back from a store.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: StoredResponse,
  /// Request header values the response varied on when it was stored
  pub vary: Vec<(String, String)>,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
  /// Whether `request` carries the same values for the stored `Vary`
  /// headers. A mismatch means the entry belongs to a different variant.
  pub fn matches(&self, request: &GatewayRequest) -> bool {
    self
      .vary
      .iter()
      .all(|(name, value)| request.header(name).map(str::trim).unwrap_or("") == value)
  }
}

/// The gateway's answer to an intercepted request, with where it came from.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
  pub response: StoredResponse,
  pub source: ResponseSource,
  /// When the response was cached (if served from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl GatewayResponse {
  /// Fetched from the network and written to the store.
  pub fn from_network(response: StoredResponse) -> Self {
    Self {
      response,
      source: ResponseSource::Network,
      cached_at: None,
    }
  }

  /// Served from the store without touching the network.
  pub fn from_cache(response: StoredResponse, cached_at: DateTime<Utc>) -> Self {
    Self {
      response,
      source: ResponseSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Fetched from the network but not eligible for storage.
  pub fn uncached(response: StoredResponse) -> Self {
    Self {
      response,
      source: ResponseSource::NetworkUncached,
      cached_at: None,
    }
  }

  /// Sent while no gateway was in control.
  pub fn bypass(response: StoredResponse) -> Self {
    Self {
      response,
      source: ResponseSource::Bypass,
      cached_at: None,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh from the network, now stored
  Network,
  /// Fresh from the network, not stored (non-GET, 206, `Vary: *`)
  NetworkUncached,
  /// Served from the cache store
  Cache,
  /// Not intercepted at all
  Bypass,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
  headers
    .iter()
    .find(|(n, _)| n.eq_ignore_ascii_case(name))
    .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let response = StoredResponse::new(200, "ok").with_header("Content-Type", "text/plain");
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.header("etag"), None);
  }

  #[test]
  fn test_partial_content_not_storable() {
    assert!(!StoredResponse::new(206, "par").is_storable());
  }

  #[test]
  fn test_vary_star_not_storable() {
    let response = StoredResponse::new(200, "x").with_header("Vary", " * ");
    assert!(!response.is_storable());

    let response = StoredResponse::new(200, "x").with_header("Vary", "Accept");
    assert!(response.is_storable());
  }

  #[test]
  fn test_error_statuses_are_storable() {
    assert!(StoredResponse::new(404, "not found").is_storable());
    assert!(StoredResponse::new(500, "").is_storable());
  }

  #[test]
  fn test_vary_snapshot_records_request_values() {
    let url = Url::parse("https://example.com/feed").unwrap();
    let request = GatewayRequest::get(url).with_header("Accept", "application/json");
    let response = StoredResponse::new(200, "{}").with_header("Vary", "Accept, Accept-Language");

    assert_eq!(
      response.vary_snapshot(&request),
      vec![
        ("accept".to_string(), "application/json".to_string()),
        ("accept-language".to_string(), String::new()),
      ]
    );
  }

  #[test]
  fn test_entry_matches_only_same_variant() {
    let url = Url::parse("https://example.com/feed").unwrap();
    let entry = CachedEntry {
      response: StoredResponse::new(200, "<html>"),
      vary: vec![("accept".to_string(), "text/html".to_string())],
      cached_at: Utc::now(),
    };

    let html = GatewayRequest::get(url.clone()).with_header("ACCEPT", "text/html");
    let json = GatewayRequest::get(url.clone()).with_header("Accept", "application/json");
    let bare = GatewayRequest::get(url);
    assert!(entry.matches(&html));
    assert!(!entry.matches(&json));
    assert!(!entry.matches(&bare));
  }

  #[test]
  fn test_entry_without_vary_matches_everything() {
    let url = Url::parse("https://example.com/").unwrap();
    let entry = CachedEntry {
      response: StoredResponse::new(200, "ok"),
      vary: Vec::new(),
      cached_at: Utc::now(),
    };
    assert!(entry.matches(&GatewayRequest::get(url).with_header("Accept", "*/*")));
  }

  #[test]
  fn test_describe_request() {
    let url = Url::parse("https://example.com/img").unwrap();
    let request = GatewayRequest::get(url);
    assert_eq!(request.describe(), "GET https://example.com/img");
  }
}
