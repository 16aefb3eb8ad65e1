//! postcode-geocoder Library
//!
//! Batch postcode geocoding: normalization, a persistent resolution cache,
//! a rate-limited provider client and a deadline-bounded batch scheduler.
//! Exposed as a library for the binary and for integration tests.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{BatchOptions, ConfigError, EngineConfig, GeocodingService};
pub use config::load_config;
pub use domain::entities::{BatchOutcome, BatchStats, Coordinate, GeoInput, GeoResult};
pub use domain::ports::{GeocodeProvider, ResolutionCache};
pub use domain::value_objects::{normalize, NormalizedKey};
pub use domain::GeocodeError;
