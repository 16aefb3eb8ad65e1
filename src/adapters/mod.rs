//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP API); outbound adapters
//! implement the domain ports (provider, cache).

pub mod inbound;
pub mod outbound;
