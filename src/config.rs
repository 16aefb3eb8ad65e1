use crate::application::EngineConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Server settings
    pub listen_addr: String,
    pub debug: bool,
    pub shutdown_drain_secs: u64,

    // Provider settings
    pub provider_url: String,

    // Cache settings (None = in-memory only)
    pub cache_path: Option<String>,

    // Engine settings
    pub max_concurrent_workers: usize,
    pub rate_limit_per_second: u64,
    pub provider_timeout_ms: u64,
    pub max_retries: u32,
    pub batch_deadline_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8090".to_string(),
            debug: false,
            shutdown_drain_secs: 30,
            provider_url: "https://api.postcodes.io".to_string(),
            cache_path: Some("geocode_cache.db".to_string()),
            max_concurrent_workers: 8,
            rate_limit_per_second: 10,
            provider_timeout_ms: 5000,
            max_retries: 3,
            batch_deadline_ms: 30_000,
        }
    }
}

impl Config {
    /// Engine options for the geocoding service.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig::default()
            .max_concurrent_workers(self.max_concurrent_workers)
            .rate_limit_per_second(self.rate_limit_per_second)
            .provider_timeout(Duration::from_millis(self.provider_timeout_ms))
            .max_retries(self.max_retries)
            .batch_deadline(Duration::from_millis(self.batch_deadline_ms))
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

pub fn load_config() -> anyhow::Result<Config> {
    let listen_addr = std::env::var("GEOCODER_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8090".to_string());

    let debug = std::env::var("DEBUG").is_ok();

    let shutdown_drain_secs = std::env::var("GEOCODER_SHUTDOWN_DRAIN_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .unwrap_or(30);

    let provider_url = std::env::var("GEOCODER_PROVIDER_URL")
        .unwrap_or_else(|_| "https://api.postcodes.io".to_string());

    // Cache settings
    let cache_path = if env_flag("GEOCODER_CACHE_IN_MEMORY") {
        None
    } else {
        Some(
            std::env::var("GEOCODER_CACHE_PATH")
                .unwrap_or_else(|_| "geocode_cache.db".to_string()),
        )
    };

    // Engine settings
    let max_concurrent_workers = std::env::var("GEOCODER_MAX_CONCURRENT_WORKERS")
        .unwrap_or_else(|_| "8".to_string())
        .parse()
        .unwrap_or(8);

    let rate_limit_per_second = std::env::var("GEOCODER_RATE_LIMIT_PER_SECOND")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);

    let provider_timeout_ms = std::env::var("GEOCODER_PROVIDER_TIMEOUT_MS")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .unwrap_or(5000);

    let max_retries = std::env::var("GEOCODER_MAX_RETRIES")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(3);

    let batch_deadline_ms = std::env::var("GEOCODER_BATCH_DEADLINE_MS")
        .unwrap_or_else(|_| "30000".to_string())
        .parse()
        .unwrap_or(30_000);

    let cfg = Config {
        listen_addr,
        debug,
        shutdown_drain_secs,
        provider_url,
        cache_path,
        max_concurrent_workers,
        rate_limit_per_second,
        provider_timeout_ms,
        max_retries,
        batch_deadline_ms,
    };

    cfg.engine().validate()?;
    Ok(cfg)
}
