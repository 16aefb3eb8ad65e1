//! Application Layer
//!
//! Use cases that orchestrate the domain through its ports.

pub mod engine_config;
pub mod geocoding_service;
pub mod provider_client;

pub use engine_config::{ConfigError, EngineConfig};
pub use geocoding_service::{BatchOptions, GeocodingService};
pub use provider_client::{RateLimitedProvider, RetryPolicy};
