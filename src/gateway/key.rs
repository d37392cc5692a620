//! Request identity used as the cache key.

use sha2::{Digest, Sha256};

use super::traits::GatewayRequest;

/// Normalized request descriptor: method, URL and the headers the gateway
/// has been told to vary on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  method: String,
  url: String,
  vary: Vec<(String, String)>,
}

impl RequestKey {
  /// Build the key for a request.
  ///
  /// The fragment is dropped from the URL, header names are lowercased and
  /// values trimmed. A vary header absent from the request contributes an
  /// empty value so "missing" and "present" never collide with each other.
  pub fn from_request(request: &GatewayRequest, vary_headers: &[String]) -> Self {
    let mut url = request.url.clone();
    url.set_fragment(None);

    let mut vary: Vec<(String, String)> = vary_headers
      .iter()
      .map(|name| {
        let name = name.trim().to_ascii_lowercase();
        let value = request.header(&name).map(str::trim).unwrap_or_default();
        (name, value.to_string())
      })
      .collect();
    vary.sort();
    vary.dedup_by(|a, b| a.0 == b.0);

    Self {
      method: request.method.as_str().to_ascii_uppercase(),
      url: url.to_string(),
      vary,
    }
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// SHA256 hash for stable, fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b"\n");
    hasher.update(self.url.as_bytes());
    for (name, value) in &self.vary {
      hasher.update(b"\n");
      hasher.update(name.as_bytes());
      hasher.update(b":");
      hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}
