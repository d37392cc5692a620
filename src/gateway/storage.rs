//! Cache storage traits and their SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::error::StoreError;
use super::key::RequestKey;
use super::traits::{CachedEntry, StoredResponse};

/// A backend that hands out named cache stores.
///
/// Each name is an independent keyspace. Switching to a new name leaves the
/// old entries where they are but unreachable through the new store.
pub trait CacheStorage: Send + Sync {
  type Store: CacheStore + 'static;

  /// Open the store with the given name, creating it if it doesn't exist.
  fn open(&self, name: &str) -> Result<Self::Store, StoreError>;
}

/// A single named store. Safe for concurrent use; no cross-key transactions.
pub trait CacheStore: Send + Sync {
  fn name(&self) -> &str;

  /// Look up the stored response for a request identity.
  fn get(&self, key: &RequestKey) -> Result<Option<CachedEntry>, StoreError>;

  /// Store a response, replacing any previous entry for the same key.
  ///
  /// `vary` holds the request's values for the headers the response varies
  /// on; it is returned with the entry so lookups can reject other variants.
  fn put(
    &self,
    key: &RequestKey,
    response: &StoredResponse,
    vary: &[(String, String)],
  ) -> Result<(), StoreError>;
}

/// Summary of one store recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
  pub name: String,
  pub entries: usize,
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// Cache database that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(CACHE_SCHEMA)?;

    // Databases written before variants were tracked lack the vary column
    let has_vary: bool = conn.query_row(
      "SELECT COUNT(*) > 0 FROM pragma_table_info('cache_entries') WHERE name = 'vary'",
      [],
      |row| row.get(0),
    )?;
    if !has_vary {
      conn.execute_batch("ALTER TABLE cache_entries ADD COLUMN vary TEXT NOT NULL DEFAULT '[]'")?;
    }

    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
    })
  }

  /// List every store name ever opened, oldest first, with entry counts.
  pub fn list_stores(&self) -> Result<Vec<StoreSummary>, StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

    let mut stmt = conn.prepare(
      "SELECT s.name, COUNT(e.key_hash) FROM cache_stores s
       LEFT JOIN cache_entries e ON e.store_name = s.name
       GROUP BY s.name
       ORDER BY s.created_at, s.name",
    )?;

    let stores = stmt
      .query_map([], |row| {
        Ok(StoreSummary {
          name: row.get(0)?,
          entries: row.get::<_, i64>(1)? as usize,
        })
      })?
      .collect::<Result<Vec<_>, _>>()?;

    Ok(stores)
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Every store name that has been opened
CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses, keyed by store name and request hash
CREATE TABLE IF NOT EXISTS cache_entries (
    store_name TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    vary TEXT NOT NULL DEFAULT '[]',
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store_name, key_hash)
);
"#;

impl CacheStorage for SqliteStorage {
  type Store = SqliteStore;

  fn open(&self, name: &str) -> Result<SqliteStore, StoreError> {
    {
      let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
      conn.execute(
        "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
        params![name],
      )?;
    }

    Ok(SqliteStore {
      conn: Arc::clone(&self.conn),
      name: name.to_string(),
    })
  }
}

/// One named store inside a [`SqliteStorage`] database.
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
  name: String,
}

impl CacheStore for SqliteStore {
  fn name(&self) -> &str {
    &self.name
  }

  fn get(&self, key: &RequestKey) -> Result<Option<CachedEntry>, StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

    let row: Option<(u16, String, Vec<u8>, String, String)> = conn
      .query_row(
        "SELECT status, headers, body, vary, cached_at FROM cache_entries
         WHERE store_name = ? AND key_hash = ?",
        params![self.name, key.cache_hash()],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
          ))
        },
      )
      .optional()?;

    match row {
      Some((status, headers, body, vary, cached_at_str)) => {
        let headers: Vec<(String, String)> = serde_json::from_str(&headers)?;
        let vary: Vec<(String, String)> = serde_json::from_str(&vary)?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          response: StoredResponse {
            status,
            headers,
            body,
          },
          vary,
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(
    &self,
    key: &RequestKey,
    response: &StoredResponse,
    vary: &[(String, String)],
  ) -> Result<(), StoreError> {
    let headers = serde_json::to_string(&response.headers)?;
    let vary = serde_json::to_string(vary)?;
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

    conn.execute(
      "INSERT OR REPLACE INTO cache_entries
         (store_name, key_hash, method, url, status, headers, body, vary, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        self.name,
        key.cache_hash(),
        key.method(),
        key.url(),
        response.status,
        headers,
        response.body,
        vary,
      ],
    )?;

    Ok(())
  }
}

type MemoryEntries = HashMap<String, HashMap<String, CachedEntry>>;

/// Storage kept entirely in process memory. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
  stores: Arc<Mutex<MemoryEntries>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  type Store = MemoryStore;

  fn open(&self, name: &str) -> Result<MemoryStore, StoreError> {
    self
      .stores
      .lock()
      .map_err(|_| StoreError::Poisoned)?
      .entry(name.to_string())
      .or_default();

    Ok(MemoryStore {
      stores: Arc::clone(&self.stores),
      name: name.to_string(),
    })
  }
}

/// One named store inside a [`MemoryStorage`].
pub struct MemoryStore {
  stores: Arc<Mutex<MemoryEntries>>,
  name: String,
}

impl CacheStore for MemoryStore {
  fn name(&self) -> &str {
    &self.name
  }

  fn get(&self, key: &RequestKey) -> Result<Option<CachedEntry>, StoreError> {
    let stores = self.stores.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(
      stores
        .get(&self.name)
        .and_then(|entries| entries.get(&key.cache_hash()))
        .cloned(),
    )
  }

  fn put(
    &self,
    key: &RequestKey,
    response: &StoredResponse,
    vary: &[(String, String)],
  ) -> Result<(), StoreError> {
    let mut stores = self.stores.lock().map_err(|_| StoreError::Poisoned)?;
    stores.entry(self.name.clone()).or_default().insert(
      key.cache_hash(),
      CachedEntry {
        response: response.clone(),
        vary: vary.to_vec(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|_| StoreError::Timestamp(s.to_string()))
}
