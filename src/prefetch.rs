//! Best-effort background population of the segment cache.
//!
//! Rewriting a media playlist yields a batch of segment and key URLs; this
//! module fetches them concurrently on a detached task so the manifest
//! response is never delayed. Failures are logged and dropped — a prefetch
//! that never lands just means a later cache miss.

use crate::cache::SegmentCache;
use crate::{metrics, origin};
use futures_util::future::join_all;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Spawn a fire-and-forget prefetch batch. Returns immediately; the caller
/// never learns whether any fetch succeeded. No-op when the cache is
/// disabled or the batch is empty.
pub fn spawn_prefetch(
    client: Client,
    cache: SegmentCache,
    urls: Vec<String>,
    forwarded_headers: HashMap<String, String>,
) {
    if !cache.is_enabled() || urls.is_empty() {
        return;
    }
    tokio::spawn(async move {
        // A playlist can repeat a URL (key rotation re-lists the same key
        // URI); the batch is a set — each distinct URL is fetched once.
        let mut seen = HashSet::new();
        let batch: Vec<&String> = urls.iter().filter(|url| seen.insert(url.as_str())).collect();

        debug!("Prefetching {} segment URLs", batch.len());
        join_all(
            batch
                .into_iter()
                .map(|url| prefetch_one(&client, &cache, url, &forwarded_headers)),
        )
        .await;
    });
}

/// Fetch one URL into the cache unless an unexpired entry already exists.
/// Never retries; any failure is logged at its boundary and swallowed.
async fn prefetch_one(
    client: &Client,
    cache: &SegmentCache,
    url: &str,
    forwarded_headers: &HashMap<String, String>,
) {
    if cache.get(url).is_some() {
        debug!("Prefetch skip (already cached): {}", url);
        metrics::record_prefetch("skipped");
        return;
    }

    match origin::get(client, url, forwarded_headers).await {
        Ok(response) if response.status().is_success() => {
            let snapshot = origin::header_snapshot(response.headers());
            match response.bytes().await {
                Ok(payload) => {
                    debug!("Prefetched {} ({} bytes)", url, payload.len());
                    cache.put(url, payload, snapshot);
                    metrics::record_prefetch("ok");
                }
                Err(e) => {
                    warn!("Prefetch body read failed for {}: {}", url, e);
                    metrics::record_prefetch("error");
                }
            }
        }
        Ok(response) => {
            warn!("Prefetch got {} for {}", response.status(), url);
            metrics::record_prefetch("error");
        }
        Err(e) => {
            warn!("Prefetch failed for {}: {}", url, e);
            metrics::record_prefetch("error");
        }
    }
}
