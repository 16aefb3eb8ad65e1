//! SQLite Resolution Cache
//!
//! Implements ResolutionCache on a SQLite file so resolutions survive
//! restarts, with a DashMap hot layer in front of it.

use super::DashMapResolutionCache;
use crate::domain::entities::{CacheEntry, Coordinate};
use crate::domain::ports::ResolutionCache;
use crate::domain::value_objects::NormalizedKey;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS geocode_cache (
    key         TEXT PRIMARY KEY,
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    resolved_at INTEGER NOT NULL
)";

/// SQLite-backed resolution cache.
///
/// Every stored row is loaded into the hot layer on open. Reads check the
/// hot layer first and fall through to SQLite, which picks up rows written
/// by other processes sharing the file. Writes go to both; the SQLite
/// write is `INSERT OR IGNORE`, so the first resolution of a key is kept.
///
/// Storage errors after open are logged and swallowed: a failed read is a
/// miss and a failed write is lost.
pub struct SqliteResolutionCache {
    conn: Arc<Mutex<Connection>>,
    hot: DashMapResolutionCache,
}

impl SqliteResolutionCache {
    /// Open (or create) a cache file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let cache = Self::from_connection(conn)?;
        tracing::info!(
            "resolution cache opened at {} ({} entries)",
            path.display(),
            cache.hot.inner().len()
        );
        Ok(cache)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;

        let hot = DashMapResolutionCache::new();
        for entry in Self::load_all(&conn)? {
            hot.insert_entry(entry);
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hot,
        })
    }

    fn load_all(conn: &Connection) -> Result<Vec<CacheEntry>> {
        let mut stmt =
            conn.prepare("SELECT key, latitude, longitude, resolved_at FROM geocode_cache")?;

        let mut entries = Vec::new();
        for row in stmt.query_map([], |row| Self::row_to_entry(row))? {
            match row? {
                Some(entry) => entries.push(entry),
                None => tracing::warn!("skipping cache row with malformed key"),
            }
        }
        Ok(entries)
    }

    /// Convert a SQLite row to a CacheEntry. Keys that no longer normalize
    /// to themselves yield `None`.
    fn row_to_entry(row: &Row) -> rusqlite::Result<Option<CacheEntry>> {
        let raw: String = row.get(0)?;
        let Ok(key) = NormalizedKey::parse(&raw) else {
            return Ok(None);
        };
        if key.as_str() != raw {
            return Ok(None);
        }
        Ok(Some(CacheEntry {
            key,
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            resolved_at: row.get(3)?,
        }))
    }

    fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<CacheEntry>> {
        conn.query_row(
            "SELECT key, latitude, longitude, resolved_at FROM geocode_cache WHERE key = ?1",
            params![key],
            |row| Self::row_to_entry(row),
        )
        .optional()
        .map(Option::flatten)
    }

    fn insert(conn: &Connection, entry: &CacheEntry) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR IGNORE INTO geocode_cache (key, latitude, longitude, resolved_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.key.as_str(),
                entry.latitude,
                entry.longitude,
                entry.resolved_at
            ],
        )
    }
}

#[async_trait]
impl ResolutionCache for SqliteResolutionCache {
    async fn get(&self, key: &NormalizedKey) -> Option<Coordinate> {
        if let Some(coordinate) = self.hot.get(key).await {
            return Some(coordinate);
        }

        let conn = self.conn.clone();
        let raw = key.as_str().to_string();
        match tokio::task::spawn_blocking(move || Self::select(&conn.lock(), &raw)).await {
            Ok(Ok(Some(entry))) => {
                let coordinate = entry.coordinate();
                self.hot.insert_entry(entry);
                Some(coordinate)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!("cache read for {} failed: {:?}", key, e);
                None
            }
            Err(e) => {
                tracing::error!("spawn_blocking error: {:?}", e);
                None
            }
        }
    }

    async fn put(&self, key: &NormalizedKey, coordinate: Coordinate) {
        let entry = CacheEntry::new(key.clone(), coordinate);
        self.hot.insert_entry(entry.clone());

        let conn = self.conn.clone();
        match tokio::task::spawn_blocking(move || Self::insert(&conn.lock(), &entry)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("cache write for {} failed: {:?}", key, e),
            Err(e) => tracing::error!("spawn_blocking error: {:?}", e),
        }
    }

    async fn len(&self) -> usize {
        let conn = self.conn.clone();
        let stored = tokio::task::spawn_blocking(move || {
            conn.lock()
                .query_row("SELECT COUNT(*) FROM geocode_cache", [], |row| row.get::<_, i64>(0))
        })
        .await;

        match stored {
            Ok(Ok(n)) => n as usize,
            Ok(Err(e)) => {
                tracing::warn!("cache count failed: {:?}", e);
                self.hot.inner().len()
            }
            Err(e) => {
                tracing::error!("spawn_blocking error: {:?}", e);
                self.hot.inner().len()
            }
        }
    }
}
