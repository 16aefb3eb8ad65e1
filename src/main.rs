//! postcode-geocoder - Batch postcode geocoding service
//!
//! This is the composition root that wires together all the components.

use postcode_geocoder::adapters::inbound::{ApiServer, ApiState};
use postcode_geocoder::adapters::outbound::{
    DashMapResolutionCache, HttpGeocodeProvider, HttpProviderConfig, SqliteResolutionCache,
};
use postcode_geocoder::application::GeocodingService;
use postcode_geocoder::config::load_config;
use postcode_geocoder::domain::ports::ResolutionCache;
use postcode_geocoder::infrastructure::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting postcode-geocoder listen={} provider={} workers={} rate={}/s",
        cfg.listen_addr,
        cfg.provider_url,
        cfg.max_concurrent_workers,
        cfg.rate_limit_per_second
    );

    // ===== COMPOSITION ROOT =====
    // Wire up all adapters and services

    // 1. Create outbound adapters

    // Resolution cache (SQLite, or DashMap when running without a file)
    let cache: Arc<dyn ResolutionCache> = match &cfg.cache_path {
        Some(path) => Arc::new(SqliteResolutionCache::open(path)?),
        None => {
            tracing::info!("resolution cache is in-memory only");
            Arc::new(DashMapResolutionCache::new())
        }
    };

    // Geocode provider (HTTP)
    let provider = Arc::new(HttpGeocodeProvider::new(HttpProviderConfig {
        base_url: cfg.provider_url.clone(),
        timeout: Duration::from_millis(cfg.provider_timeout_ms),
    })?);

    // 2. Create application service
    let service = Arc::new(GeocodingService::new(provider, cache, cfg.engine())?);

    // 3. Install shutdown handling
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // 4. Create inbound adapter and run
    let server = ApiServer::new(
        cfg.listen_addr.clone(),
        ApiState::new(service, shutdown.clone()),
    );
    server.run().await?;

    if !shutdown
        .wait_for_drain(Duration::from_secs(cfg.shutdown_drain_secs))
        .await
    {
        tracing::warn!("exiting with batches still running");
    }

    tracing::info!("postcode-geocoder stopped");
    Ok(())
}
