//! Command implementations behind the CLI.

use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::io::Write;
use tracing::{debug, info};

use crate::clipboard;
use crate::config::Config;
use crate::gateway::{
  CacheStorage, Dispatcher, Gateway, GatewayRequest, GatewayResponse, HttpFetcher, MemoryStorage,
  ResponseSource, SqliteStorage,
};
use crate::theme::Theme;

/// Options for `crib fetch`.
#[derive(Debug, Clone)]
pub struct FetchOptions {
  pub urls: Vec<String>,
  pub method: String,
  pub headers: Vec<String>,
  /// Request body, sent as is
  pub data: Option<String>,
  pub ephemeral: bool,
  pub include: bool,
}

/// Send each URL through an installed gateway and print the responses.
pub async fn fetch(config: &Config, options: FetchOptions) -> Result<()> {
  let network = HttpFetcher::new(config.timeout())?;

  if options.ephemeral {
    fetch_with(MemoryStorage::new(), network, config, &options).await
  } else {
    let path = config.database_path()?;
    let storage = SqliteStorage::open_at(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;
    fetch_with(storage, network, config, &options).await
  }
}

async fn fetch_with<S>(
  storage: S,
  network: HttpFetcher,
  config: &Config,
  options: &FetchOptions,
) -> Result<()>
where
  S: CacheStorage + 'static,
{
  // Build every request up front so bad input fails before anything is sent
  let requests = options
    .urls
    .iter()
    .map(|url| {
      build_request(
        config,
        &options.method,
        url,
        &options.headers,
        options.data.as_deref(),
      )
    })
    .collect::<Result<Vec<_>>>()?;

  let gateway = Gateway::new(storage, network.clone(), &config.cache_name)
    .with_vary_headers(config.vary_headers.clone())
    .with_precache(config.precache_urls()?);

  let mut dispatcher = Dispatcher::new(network);
  dispatcher.register(gateway);
  dispatcher.install().await?;

  let mut failures = 0;
  let stdout = std::io::stdout();

  for request in requests {
    let description = request.describe();
    match dispatcher.dispatch(request).await {
      Ok(response) => {
        info!(
          request = %description,
          status = response.response.status,
          source = source_label(response.source),
          "Request served"
        );
        let mut out = stdout.lock();
        write_response(&mut out, &response, options.include)?;
        out.flush()?;
      }
      // Logged where it failed
      Err(err) => {
        debug!(request = %description, error = %err, "Request failed");
        failures += 1;
      }
    }
  }

  if failures > 0 {
    return Err(eyre!("{} of {} requests failed", failures, options.urls.len()));
  }
  Ok(())
}

fn source_label(source: ResponseSource) -> &'static str {
  match source {
    ResponseSource::Network => "network",
    ResponseSource::NetworkUncached => "network (not stored)",
    ResponseSource::Cache => "cache",
    ResponseSource::Bypass => "network (bypassed gateway)",
  }
}

fn build_request(
  config: &Config,
  method: &str,
  url: &str,
  headers: &[String],
  data: Option<&str>,
) -> Result<GatewayRequest> {
  let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
    .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;
  let url = config.resolve_url(url)?;

  let mut request = GatewayRequest::new(method, url);
  if let Some(data) = data {
    request = request.with_body(data);
  }

  headers.iter().try_fold(request, |request, header| {
    let (name, value) = parse_header(header)?;
    Ok(request.with_header(name, value))
  })
}

/// Parse a curl-style `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(&str, &str)> {
  let (name, value) = raw
    .split_once(':')
    .ok_or_else(|| eyre!("Invalid header '{}', expected 'Name: value'", raw))?;
  let name = name.trim();
  if name.is_empty() {
    return Err(eyre!("Invalid header '{}', name is empty", raw));
  }
  Ok((name, value.trim()))
}

fn write_response(out: &mut impl Write, response: &GatewayResponse, include: bool) -> Result<()> {
  if include {
    writeln!(out, "HTTP {}", response.response.status)?;
    for (name, value) in &response.response.headers {
      writeln!(out, "{}: {}", name, value)?;
    }
    writeln!(out)?;
  }
  out.write_all(&response.response.body)?;
  Ok(())
}

/// Copy text to the clipboard. Never fails.
pub fn copy(text: &str) {
  if clipboard::copy(text).is_copied() {
    info!(chars = text.chars().count(), "Copied to clipboard");
  }
}

/// Print the theme, or the value for one name.
pub fn theme(name: Option<&str>, json: bool) -> Result<()> {
  let theme = Theme::default();

  let output = match name {
    Some(name) => theme
      .resolve(name)
      .ok_or_else(|| eyre!("No color or font named '{}'", name))?,
    None if json => serde_json::to_string_pretty(&theme)?,
    None => serde_yaml::to_string(&theme)?,
  };

  println!("{}", output.trim_end());
  Ok(())
}

/// List the stores recorded in the cache database.
pub fn stores(config: &Config) -> Result<()> {
  let path = config.database_path()?;
  let storage = SqliteStorage::open_at(&path)
    .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;
  let stores = storage
    .list_stores()
    .map_err(|e| eyre!("Failed to list cache stores: {}", e))?;

  if stores.is_empty() {
    println!("No cache stores in {}", path.display());
    return Ok(());
  }

  for store in stores {
    let marker = if store.name == config.cache_name { "*" } else { " " };
    println!("{} {}\t{} entries", marker, store.name, store.entries);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::StoredResponse;

  fn config_with_base() -> Config {
    Config {
      base_url: Some("http://localhost:8080".to_string()),
      ..Config::default()
    }
  }

  #[test]
  fn test_parse_header() {
    assert_eq!(parse_header("Accept: text/html").unwrap(), ("Accept", "text/html"));
    assert_eq!(parse_header("X-Empty:").unwrap(), ("X-Empty", ""));
    assert!(parse_header("no-colon").is_err());
    assert!(parse_header(": value").is_err());
  }

  #[test]
  fn test_build_request() {
    let request = build_request(
      &config_with_base(),
      "get",
      "/img",
      &["Accept: image/png".to_string()],
      None,
    )
    .unwrap();

    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url.as_str(), "http://localhost:8080/img");
    assert_eq!(request.header("accept"), Some("image/png"));
    assert!(request.body.is_none());
  }

  #[test]
  fn test_build_request_with_data() {
    let request = build_request(
      &config_with_base(),
      "post",
      "/submit",
      &["Content-Type: application/x-www-form-urlencoded".to_string()],
      Some("name=crib"),
    )
    .unwrap();

    assert_eq!(request.method, Method::POST);
    assert_eq!(request.body.as_deref(), Some(&b"name=crib"[..]));
  }

  #[test]
  fn test_build_request_rejects_bad_method() {
    assert!(build_request(&config_with_base(), "GE T", "/", &[], None).is_err());
  }

  #[test]
  fn test_write_response_with_headers() {
    let response = GatewayResponse {
      response: StoredResponse::new(200, "A")
        .with_header("Content-Type", "text/plain"),
      source: ResponseSource::Cache,
      cached_at: None,
    };

    let mut out = Vec::new();
    write_response(&mut out, &response, true).unwrap();
    assert_eq!(out, b"HTTP 200\nContent-Type: text/plain\n\nA");

    let mut out = Vec::new();
    write_response(&mut out, &response, false).unwrap();
    assert_eq!(out, b"A");
  }

  #[test]
  fn test_theme_unknown_name() {
    assert!(theme(Some("blue"), false).is_err());
    assert!(theme(Some("nostr-dark"), false).is_ok());
  }
}
