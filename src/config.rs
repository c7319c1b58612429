//! Application configuration loaded from environment variables.

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public base URL this proxy is reachable at; rewritten playlist URIs
    /// point back here.
    pub base_url: String,
    pub is_dev: bool,
    /// Master toggle: when false, both proxy endpoints answer 404.
    pub proxy_enabled: bool,
    /// When false the segment cache always misses and prefetching is a no-op.
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub janitor_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and
    /// BASE_URL are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // Base URL: required in prod, defaults to localhost in dev
        let base_url = if is_dev {
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"))
        } else {
            env::var("BASE_URL").map_err(|_| "BASE_URL is required in production")?
        };

        let proxy_enabled = bool_var("PROXY_ENABLED", true);
        let cache_enabled = bool_var("CACHE_ENABLED", true);

        let cache_capacity = env::var("CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CAPACITY);

        let cache_ttl = env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);

        let janitor_interval = env::var("JANITOR_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);

        Ok(Config {
            port,
            base_url,
            is_dev,
            proxy_enabled,
            cache_enabled,
            cache_capacity,
            cache_ttl,
            janitor_interval,
        })
    }
}

fn bool_var(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
