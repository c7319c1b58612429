use crate::{cache::SegmentCache, config::Config};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling
    pub http_client: Client,
    /// Segment cache populated by the prefetcher
    pub cache: SegmentCache,
    /// Startup instant, anchoring the uptime reported by /health
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration.
    pub fn new(config: Config) -> Self {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        let cache = if config.cache_enabled {
            SegmentCache::new(config.cache_capacity, config.cache_ttl)
        } else {
            SegmentCache::disabled()
        };

        Self {
            config: Arc::new(config),
            http_client,
            cache,
            started_at: Instant::now(),
        }
    }
}
