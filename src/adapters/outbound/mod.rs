mod dashmap_resolution_cache;
mod http_geocode_provider;
mod sqlite_resolution_cache;

pub use dashmap_resolution_cache::DashMapResolutionCache;
pub use http_geocode_provider::{HttpGeocodeProvider, HttpProviderConfig};
pub use sqlite_resolution_cache::SqliteResolutionCache;
