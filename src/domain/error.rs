//! Geocoding Error Taxonomy
//!
//! Every failure an individual postcode can hit on its way to a coordinate.
//! None of these ever escalate past the item they belong to.

use std::time::Duration;

/// Per-item geocoding failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    /// Input does not have the shape of a postcode. Never sent to the provider.
    #[error("invalid postcode {input:?}: {reason}")]
    InvalidFormat { input: String, reason: &'static str },

    /// The provider confirmed it has no coordinate for this key.
    #[error("provider has no coordinate for {0}")]
    ProviderRejected(String),

    /// The provider did not answer within the per-call timeout.
    #[error("provider did not answer within {0:?}")]
    ProviderTimeout(Duration),

    /// The provider is throttling us and backoff did not help.
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// 5xx, connection reset, undecodable body.
    #[error("transient provider failure: {0}")]
    Transient(String),
}

impl GeocodeError {
    pub(crate) fn invalid(input: &str, reason: &'static str) -> Self {
        Self::InvalidFormat {
            input: input.to_string(),
            reason,
        }
    }

    /// Whether another attempt against the provider could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout(_) | Self::RateLimited | Self::Transient(_)
        )
    }

    /// Short label used in logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat { .. } => "invalid_format",
            Self::ProviderRejected(_) => "provider_rejected",
            Self::ProviderTimeout(_) => "provider_timeout",
            Self::RateLimited => "rate_limited",
            Self::Transient(_) => "transient",
        }
    }
}
