mod geocode_provider;
mod resolution_cache;

pub use geocode_provider::GeocodeProvider;
pub use resolution_cache::ResolutionCache;
