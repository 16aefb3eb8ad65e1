//! Resolution Cache Port
//!
//! Defines the interface for the persistent postcode -> coordinate cache.

use crate::domain::entities::Coordinate;
use crate::domain::value_objects::NormalizedKey;
use async_trait::async_trait;

/// Cache of previously resolved postcodes.
///
/// Postcodes do not move, so entries never expire and are never updated.
/// `put` is an idempotent upsert: racing writers for the same key are
/// harmless because the provider is deterministic per key, and the first
/// write wins. Implementations are shared across all concurrent batches
/// and must synchronize internally.
///
/// Storage failures are not surfaced: a failed read is a miss and a
/// failed write is dropped.
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    /// Look up a key. Never touches the network.
    async fn get(&self, key: &NormalizedKey) -> Option<Coordinate>;

    /// Record a resolution.
    async fn put(&self, key: &NormalizedKey, coordinate: Coordinate);

    /// Number of cached keys.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
