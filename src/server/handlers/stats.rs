use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// Point-in-time cache diagnostics. Sweeps expired entries first so the
/// reported count is current.
pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.stats();

    Json(json!({
        "entries": stats.entries,
        "totalSizeMB": round2(stats.total_bytes as f64 / (1024.0 * 1024.0)),
        "avgEntrySizeKB": round2(stats.avg_entry_bytes as f64 / 1024.0),
        "maxSize": stats.capacity,
        "expiryHours": round2(stats.ttl.as_secs_f64() / 3600.0),
    }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
