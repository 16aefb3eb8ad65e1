//! DashMap Resolution Cache
//!
//! Implements ResolutionCache using DashMap for lock-free concurrent access.
//! Process-local: entries are lost on restart.

use crate::domain::entities::{CacheEntry, Coordinate};
use crate::domain::ports::ResolutionCache;
use crate::domain::value_objects::NormalizedKey;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed resolution cache.
///
/// Also serves as the hot layer in front of
/// [`SqliteResolutionCache`](super::SqliteResolutionCache).
#[derive(Clone)]
pub struct DashMapResolutionCache {
    entries: Arc<DashMap<NormalizedKey, CacheEntry>>,
}

impl DashMapResolutionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Full entry for a key, including when it was resolved.
    pub fn entry(&self, key: &NormalizedKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Insert a pre-built entry, keeping any existing one.
    pub fn insert_entry(&self, entry: CacheEntry) {
        self.entries.entry(entry.key.clone()).or_insert(entry);
    }

    /// Get the underlying DashMap (for advanced use cases).
    #[allow(dead_code)]
    pub fn inner(&self) -> &Arc<DashMap<NormalizedKey, CacheEntry>> {
        &self.entries
    }
}

impl Default for DashMapResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolutionCache for DashMapResolutionCache {
    async fn get(&self, key: &NormalizedKey) -> Option<Coordinate> {
        self.entries.get(key).map(|e| e.value().coordinate())
    }

    async fn put(&self, key: &NormalizedKey, coordinate: Coordinate) {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone(), coordinate));
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}
