//! Geocode Provider Port
//!
//! Defines the interface for resolving a postcode to a coordinate.

use crate::domain::entities::Coordinate;
use crate::domain::error::GeocodeError;
use crate::domain::value_objects::NormalizedKey;
use async_trait::async_trait;

/// Resolver for a normalized postcode to a geographic coordinate.
///
/// This is an outbound port that abstracts the external geocoding service.
/// One call is one lookup; implementations do not retry or rate limit on
/// their own, that is layered on by the application's provider client.
///
/// Implementations must be deterministic per key and must distinguish
/// "no such postcode" ([`GeocodeError::ProviderRejected`]) from transient
/// failures and throttling.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Resolve a single key.
    async fn resolve(&self, key: &NormalizedKey) -> Result<Coordinate, GeocodeError>;
}
