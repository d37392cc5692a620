use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Store name used when none is configured.
pub const DEFAULT_CACHE_NAME: &str = "CRIB-v1";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Version-tagged name of the active cache store. Changing it makes every
  /// entry stored under the old name unreachable.
  pub cache_name: String,
  /// Base for resolving relative request URLs such as "/" or "/img"
  pub base_url: Option<String>,
  /// Request headers that take part in the cache key (case-insensitive)
  pub vary_headers: Vec<String>,
  /// Network request timeout
  pub timeout_secs: u64,
  /// Cache database location (defaults to $XDG_DATA_HOME/crib/cache.db)
  pub database: Option<PathBuf>,
  /// URLs fetched into the store when the gateway is installed
  pub precache: Vec<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      cache_name: DEFAULT_CACHE_NAME.to_string(),
      base_url: None,
      vary_headers: Vec::new(),
      timeout_secs: 30,
      database: None,
      precache: Vec::new(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./crib.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/crib/config.yaml
  ///
  /// Without any file the defaults are used. `CRIB_CACHE_NAME` overrides the
  /// store name either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    config.with_env_overrides().validated()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("crib.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("crib").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn with_env_overrides(self) -> Self {
    self.with_cache_name_override(std::env::var("CRIB_CACHE_NAME").ok())
  }

  /// Replace `cache_name` unless the override is missing or blank.
  fn with_cache_name_override(self, name: Option<String>) -> Self {
    match name {
      Some(name) if !name.trim().is_empty() => Self {
        cache_name: name,
        ..self
      },
      _ => self,
    }
  }

  fn validated(self) -> Result<Self> {
    if self.cache_name.trim().is_empty() {
      return Err(eyre!("cache_name must not be empty"));
    }
    if self.timeout_secs == 0 {
      return Err(eyre!("timeout_secs must be greater than zero"));
    }
    if let Some(base) = &self.base_url {
      Url::parse(base).map_err(|e| eyre!("Invalid base_url '{}': {}", base, e))?;
    }
    Ok(self)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// Resolve a request URL, joining relative ones onto `base_url`.
  pub fn resolve_url(&self, input: &str) -> Result<Url> {
    match Url::parse(input) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        let base = self
          .base_url
          .as_deref()
          .ok_or_else(|| eyre!("Relative URL '{}' needs base_url to be configured", input))?;
        Url::parse(base)
          .and_then(|base| base.join(input))
          .map_err(|e| eyre!("Invalid URL '{}': {}", input, e))
      }
      Err(e) => Err(eyre!("Invalid URL '{}': {}", input, e)),
    }
  }

  /// The precache list, resolved the same way request URLs are.
  pub fn precache_urls(&self) -> Result<Vec<Url>> {
    self.precache.iter().map(|u| self.resolve_url(u)).collect()
  }

  /// Get the cache database path.
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database {
      Some(path) => Ok(path.clone()),
      None => Ok(Self::data_dir()?.join("cache.db")),
    }
  }

  /// Directory for the cache database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("crib"))
  }
}
