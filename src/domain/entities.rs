//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the geocoding domain.
//! They have no external dependencies beyond serde.

use crate::domain::error::GeocodeError;
use crate::domain::value_objects::NormalizedKey;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A postcode submitted for geocoding, with the weight that rides along.
///
/// `value` is opaque to the engine (typically a lead's monetary worth)
/// and is returned untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInput {
    pub postcode: String,
    pub value: f64,
}

impl GeoInput {
    pub fn new(postcode: impl Into<String>, value: f64) -> Self {
        Self {
            postcode: postcode.into(),
            value,
        }
    }
}

/// A point on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A successfully geocoded input.
///
/// `postcode` is the caller's original string, not the normalized key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

impl GeoResult {
    pub fn from_input(input: &GeoInput, coordinate: Coordinate) -> Self {
        Self {
            postcode: input.postcode.clone(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            value: input.value,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A cached resolution. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: NormalizedKey,
    pub latitude: f64,
    pub longitude: f64,
    /// Unix milliseconds at which the provider answered
    pub resolved_at: i64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: NormalizedKey, coordinate: Coordinate) -> Self {
        Self {
            key,
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            resolved_at: now_unix_ms(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Per-batch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Inputs submitted
    pub total: usize,
    /// Inputs answered from the resolution cache
    pub cache_hits: usize,
    /// Distinct keys sent to the provider
    pub provider_lookups: usize,
    /// Inputs that failed normalization
    pub invalid: usize,
    /// Inputs the provider has no coordinate for
    pub rejected: usize,
    /// Inputs whose lookup timed out
    pub timed_out: usize,
    /// Inputs whose lookup stayed throttled
    pub rate_limited: usize,
    /// Inputs whose lookup hit other transient failures
    pub transient: usize,
    /// Inputs still in flight when the batch deadline expired
    pub abandoned: usize,
}

impl BatchStats {
    /// Count `n` inputs as failed with `err`.
    pub fn record_failure(&mut self, err: &GeocodeError, n: usize) {
        match err {
            GeocodeError::InvalidFormat { .. } => self.invalid += n,
            GeocodeError::ProviderRejected(_) => self.rejected += n,
            GeocodeError::ProviderTimeout(_) => self.timed_out += n,
            GeocodeError::RateLimited => self.rate_limited += n,
            GeocodeError::Transient(_) => self.transient += n,
        }
    }

    /// Total inputs that produced no result.
    pub fn failed(&self) -> usize {
        self.invalid
            + self.rejected
            + self.timed_out
            + self.rate_limited
            + self.transient
            + self.abandoned
    }
}

/// Outcome of a batch: the resolved items in input order plus what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<GeoResult>,
    pub failed: usize,
    pub stats: BatchStats,
}

impl BatchOutcome {
    pub fn new(results: Vec<GeoResult>, stats: BatchStats) -> Self {
        Self {
            results,
            failed: stats.failed(),
            stats,
        }
    }

    /// At least one input resolved.
    pub fn success(&self) -> bool {
        !self.results.is_empty()
    }
}
