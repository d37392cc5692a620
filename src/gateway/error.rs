//! Error types for the gateway.

use std::fmt;
use thiserror::Error;

/// Failures raised by a cache store backend.
#[derive(Error, Debug)]
pub enum StoreError {
  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("Failed to encode stored headers: {0}")]
  Encoding(#[from] serde_json::Error),

  #[error("Failed to parse cached_at '{0}'")]
  Timestamp(String),

  #[error("Cache store lock poisoned")]
  Poisoned,

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Broad classification of a failed network fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
  /// Connection refused, DNS failure, TLS handshake failure
  Connect,
  Timeout,
  /// Response arrived but its body could not be read
  Body,
  Other,
}

impl fmt::Display for FetchErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Self::Connect => "connection failed",
      Self::Timeout => "timed out",
      Self::Body => "body read failed",
      Self::Other => "request failed",
    };
    f.write_str(label)
  }
}

/// A network fetch that produced no response.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct FetchError {
  pub kind: FetchErrorKind,
  pub message: String,
}

impl FetchError {
  pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    let kind = if err.is_timeout() {
      FetchErrorKind::Timeout
    } else if err.is_connect() {
      FetchErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
      FetchErrorKind::Body
    } else {
      FetchErrorKind::Other
    };
    Self::new(kind, err.to_string())
  }
}

/// Everything that can make an intercepted request fail.
///
/// None of these are recovered from: the request fails and the caller sees
/// the error. No placeholder content is ever served in its place.
#[derive(Error, Debug)]
pub enum GatewayError {
  #[error("Failed to open cache store '{name}': {source}")]
  StoreOpen {
    name: String,
    #[source]
    source: StoreError,
  },

  #[error("Cache store '{name}' access failed: {source}")]
  Store {
    name: String,
    #[source]
    source: StoreError,
  },

  #[error("Network request {request} failed: {source}")]
  Network {
    request: String,
    #[source]
    source: FetchError,
  },

  #[error("Interception failed: {0}")]
  Internal(String),
}

impl GatewayError {
  /// The underlying fetch failure, if this was a network error.
  #[allow(dead_code)]
  pub fn fetch_error(&self) -> Option<&FetchError> {
    match self {
      Self::Network { source, .. } => Some(source),
      _ => None,
    }
  }
}
