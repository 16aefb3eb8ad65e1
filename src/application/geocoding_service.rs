//! Geocoding Service - Main application use case
//!
//! Batch scheduler for postcode geocoding: normalizes inputs, answers what
//! it can from the resolution cache, fans the misses out over a bounded
//! worker pool sharing one rate-limited provider client, and hands the
//! survivors to the aggregator. This is the primary interface for the
//! inbound adapter.

use crate::application::engine_config::{ConfigError, EngineConfig};
use crate::application::provider_client::RateLimitedProvider;
use crate::domain::entities::{BatchOutcome, BatchStats, Coordinate, GeoInput};
use crate::domain::error::GeocodeError;
use crate::domain::ports::{GeocodeProvider, ResolutionCache};
use crate::domain::services::Aggregator;
use crate::domain::value_objects::{normalize, NormalizedKey};
use crate::infrastructure::rate_limiter::{RateLimitConfig, RateLimiter};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Per-call overrides for a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Replaces the configured batch deadline
    pub deadline: Option<Duration>,
}

impl BatchOptions {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }
}

/// A distinct cache-miss key and every input position waiting on it.
struct PendingLookup {
    key: NormalizedKey,
    indices: Vec<usize>,
}

type LookupOutcome = (usize, Result<Coordinate, GeocodeError>);
type JobQueue = Arc<Mutex<VecDeque<(usize, NormalizedKey)>>>;

/// Geocoding service - batch scheduler.
///
/// One instance is shared by every caller in the process; the cache and
/// the rate limiter inside the provider client are the only state that
/// outlives a batch.
///
/// Per-item failures never fail the batch. An input is dropped from the
/// output when its postcode is malformed, when the provider rejects it,
/// when its lookup keeps failing after retries, or when the batch deadline
/// expires before its lookup completes.
pub struct GeocodingService {
    client: Arc<RateLimitedProvider>,
    cache: Arc<dyn ResolutionCache>,
    config: EngineConfig,
}

impl GeocodingService {
    /// Create a new geocoding service with its own rate limiter.
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        cache: Arc<dyn ResolutionCache>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_second(
            config.rate_limit_per_second,
        )));
        Self::with_limiter(provider, cache, limiter, config)
    }

    /// Create a geocoding service around an existing limiter, so several
    /// services can share one provider budget.
    pub fn with_limiter(
        provider: Arc<dyn GeocodeProvider>,
        cache: Arc<dyn ResolutionCache>,
        limiter: Arc<RateLimiter>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Arc::new(RateLimitedProvider::from_config(provider, limiter, &config));

        Ok(Self {
            client,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn ResolutionCache> {
        &self.cache
    }

    /// Geocode lead postcodes. Same as [`Self::geocode_batch`].
    pub async fn geocode_postcodes(&self, items: &[GeoInput]) -> BatchOutcome {
        self.geocode_batch(items).await
    }

    /// Geocode a batch under the configured deadline.
    pub async fn geocode_batch(&self, inputs: &[GeoInput]) -> BatchOutcome {
        self.geocode_batch_with(inputs, BatchOptions::default()).await
    }

    /// Geocode a batch.
    ///
    /// # Returns
    /// The resolved items in input order, plus per-kind failure counts.
    /// An empty input yields an empty outcome.
    pub async fn geocode_batch_with(
        &self,
        inputs: &[GeoInput],
        options: BatchOptions,
    ) -> BatchOutcome {
        if inputs.is_empty() {
            return BatchOutcome::default();
        }

        let budget = options.deadline.unwrap_or(self.config.batch_deadline);
        let deadline = Instant::now() + budget;
        let span = tracing::info_span!(
            "geocode_batch",
            batch_id = %Uuid::new_v4(),
            total = inputs.len()
        );

        async move {
            let outcome = self.run(inputs, deadline).await;
            tracing::info!(
                resolved = outcome.results.len(),
                failed = outcome.failed,
                cache_hits = outcome.stats.cache_hits,
                provider_lookups = outcome.stats.provider_lookups,
                abandoned = outcome.stats.abandoned,
                "batch complete"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, inputs: &[GeoInput], deadline: Instant) -> BatchOutcome {
        let mut stats = BatchStats {
            total: inputs.len(),
            ..Default::default()
        };
        let mut resolved: Vec<(usize, &GeoInput, Coordinate)> = Vec::with_capacity(inputs.len());
        let mut pending: Vec<PendingLookup> = Vec::new();
        let mut pending_by_key: HashMap<NormalizedKey, usize> = HashMap::new();

        let mut cache_pass_expired = false;

        // 1. Normalize, 2-3. answer hits from the cache
        for (index, input) in inputs.iter().enumerate() {
            let key = match normalize(&input.postcode) {
                Ok(key) => key,
                Err(e) => {
                    tracing::debug!("dropping input {}: {}", index, e);
                    stats.record_failure(&e, 1);
                    continue;
                }
            };

            if let Some(&slot) = pending_by_key.get(&key) {
                pending[slot].indices.push(index);
                continue;
            }

            if cache_pass_expired {
                stats.abandoned += 1;
                continue;
            }

            match tokio::time::timeout_at(deadline, self.cache.get(&key)).await {
                Ok(Some(coordinate)) => {
                    stats.cache_hits += 1;
                    resolved.push((index, input, coordinate));
                }
                Ok(None) => {
                    pending_by_key.insert(key.clone(), pending.len());
                    pending.push(PendingLookup {
                        key,
                        indices: vec![index],
                    });
                }
                Err(_) => {
                    tracing::warn!(
                        "batch deadline reached during cache pass at input {} of {}",
                        index,
                        inputs.len()
                    );
                    cache_pass_expired = true;
                    stats.abandoned += 1;
                }
            }
        }

        // 4-5. One provider lookup per distinct missing key
        stats.provider_lookups = pending.len();
        let outcomes = self.dispatch(&pending, deadline).await;

        // 6. Contain failures to the inputs that share the failed key
        for (lookup, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Some(Ok(coordinate)) => {
                    for &index in &lookup.indices {
                        resolved.push((index, &inputs[index], coordinate));
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!("lookup {} failed: {}", lookup.key, e);
                    stats.record_failure(&e, lookup.indices.len());
                }
                None => stats.abandoned += lookup.indices.len(),
            }
        }

        BatchOutcome::new(Aggregator::assemble(resolved), stats)
    }

    /// Run every pending lookup through the worker pool.
    ///
    /// Returns one slot per lookup; `None` marks a lookup still in flight
    /// (or never started) when the deadline expired.
    async fn dispatch(
        &self,
        pending: &[PendingLookup],
        deadline: Instant,
    ) -> Vec<Option<Result<Coordinate, GeocodeError>>> {
        let mut outcomes = vec![None; pending.len()];
        if pending.is_empty() || Instant::now() >= deadline {
            return outcomes;
        }

        let queue: JobQueue = Arc::new(Mutex::new(
            pending
                .iter()
                .enumerate()
                .map(|(slot, lookup)| (slot, lookup.key.clone()))
                .collect(),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker_count = self.config.max_concurrent_workers.min(pending.len());
        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            workers.spawn(
                Self::worker(queue.clone(), tx.clone(), self.client.clone(), self.cache.clone())
                    .in_current_span(),
            );
        }
        drop(tx);

        let mut received = 0;
        while received < pending.len() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((slot, result))) => {
                    outcomes[slot] = Some(result);
                    received += 1;
                }
                Ok(None) => {
                    tracing::warn!(
                        "worker pool exited with {} lookups outstanding",
                        pending.len() - received
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "batch deadline reached with {} lookups outstanding",
                        pending.len() - received
                    );
                    workers.abort_all();
                    break;
                }
            }
        }

        outcomes
    }

    /// Pull keys off the shared queue until it is empty.
    ///
    /// Successful resolutions are cached before being reported, so any
    /// batch that starts afterwards sees them.
    async fn worker(
        queue: JobQueue,
        results: mpsc::UnboundedSender<LookupOutcome>,
        client: Arc<RateLimitedProvider>,
        cache: Arc<dyn ResolutionCache>,
    ) {
        loop {
            let job = queue.lock().pop_front();
            let Some((slot, key)) = job else {
                return;
            };

            let result = client.resolve(&key).await;
            if let Ok(coordinate) = &result {
                cache.put(&key, *coordinate).await;
            }

            if results.send((slot, result)).is_err() {
                return;
            }
        }
    }
}
