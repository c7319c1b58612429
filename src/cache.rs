//! Bounded, TTL-expiring segment cache.
//!
//! Maps absolute origin URLs to payload bytes plus a response-header
//! snapshot. Entries expire two hours after insertion (lazy expiry on read)
//! and the store is capped at 2000 entries with oldest-insertion eviction —
//! a read never refreshes an entry's age. A janitor task sweeps expired and
//! over-capacity entries every 30 minutes.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default maximum number of cached entries.
pub const DEFAULT_CAPACITY: usize = 2000;

/// Default time-to-live for a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Default interval between janitor sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// One cached segment or key payload.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Fetched body bytes.
    pub payload: Bytes,
    /// Response headers captured at fetch time, names lower-cased.
    pub headers: HashMap<String, String>,
    inserted_at: Instant,
}

impl CacheEntry {
    /// The `content-type` captured at fetch time, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Point-in-time cache snapshot for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub avg_entry_bytes: usize,
    pub capacity: usize,
    pub ttl: Duration,
}

/// Thread-safe segment cache shared by request handlers, the prefetcher,
/// and the janitor. Cloning is cheap and shares the underlying map.
#[derive(Clone, Debug)]
pub struct SegmentCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
    enabled: bool,
}

impl SegmentCache {
    /// Create a cache bounded at `capacity` entries with the given TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            capacity,
            ttl,
            enabled: true,
        }
    }

    /// Create a disabled cache: every read misses, every write is a no-op.
    pub fn disabled() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            capacity: 0,
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently stored, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an unexpired entry. An expired entry found here is removed
    /// as a side effect and reported as a miss.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        if let Some(entry) = self.entries.get(url) {
            if entry.inserted_at.elapsed() <= self.ttl {
                debug!("Segment cache HIT for {}", url);
                return Some(entry.clone());
            }
            // Stale — drop the read guard before removing
            drop(entry);
            self.entries.remove(url);
        }
        debug!("Segment cache MISS for {}", url);
        None
    }

    /// Insert a fetched payload, overwriting any existing entry and
    /// resetting its age. At or over capacity, a cleanup pass runs first;
    /// the insert itself always succeeds.
    pub fn put(&self, url: &str, payload: Bytes, headers: HashMap<String, String>) {
        if !self.enabled {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_expired();
            self.evict_to_capacity();
        }
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                payload,
                headers,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove every entry older than the TTL. Returns the count removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// If over capacity, remove the oldest-inserted entries until the size
    /// is back at capacity. Returns the count removed.
    pub fn evict_to_capacity(&self) -> usize {
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        let mut removed = 0;
        for (url, _) in by_age.into_iter().take(excess) {
            if self.entries.remove(&url).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Diagnostics snapshot. Expired entries are swept first so the
    /// reported count is not stale.
    pub fn stats(&self) -> CacheStats {
        self.evict_expired();
        let entries = self.entries.len();
        let total_bytes: usize = self
            .entries
            .iter()
            .map(|entry| entry.value().payload.len())
            .sum();
        CacheStats {
            entries,
            total_bytes,
            avg_entry_bytes: if entries == 0 { 0 } else { total_bytes / entries },
            capacity: self.capacity,
            ttl: self.ttl,
        }
    }
}

/// Spawn the recurring cleanup task: evict expired entries, then anything
/// over capacity. Runs until `shutdown` is cancelled; safe to run
/// concurrently with reads and writes.
pub fn spawn_janitor(
    cache: SegmentCache,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; consume the first tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cache janitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let expired = cache.evict_expired();
                    let evicted = cache.evict_to_capacity();
                    if expired + evicted > 0 {
                        info!(
                            "Cache sweep removed {} expired and {} over-capacity entries ({} remain)",
                            expired,
                            evicted,
                            cache.len()
                        );
                    }
                }
            }
        }
    })
}
