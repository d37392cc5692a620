//! Network backend the gateway falls through to on a cache miss.

use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;

use super::error::FetchError;
use super::traits::{GatewayRequest, StoredResponse};

/// Performs the actual network request.
///
/// Implementations buffer the whole body so the response can be both stored
/// and returned.
pub trait Fetch: Send + Sync + 'static {
  fn fetch(&self, request: GatewayRequest) -> BoxFuture<'static, Result<StoredResponse, FetchError>>;
}

/// HTTP fetcher backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("crib/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self { client })
  }
}

impl Fetch for HttpFetcher {
  fn fetch(&self, request: GatewayRequest) -> BoxFuture<'static, Result<StoredResponse, FetchError>> {
    let client = self.client.clone();

    async move {
      let mut builder = client.request(request.method, request.url);
      for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
      }
      if let Some(body) = request.body {
        builder = builder.body(body);
      }

      let response = builder.send().await?;
      let status = response.status().as_u16();
      let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
          value
            .to_str()
            .ok()
            .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
      let body = response.bytes().await?.to_vec();

      Ok::<_, FetchError>(StoredResponse {
        status,
        headers,
        body,
      })
    }
    .boxed()
  }
}
