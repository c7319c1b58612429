use crate::{
    error::{ProxyError, Result},
    metrics, origin, prefetch,
    rewrite::{self, HLS_CONTENT_TYPE},
    server::{handlers::parse_proxy_params, state::AppState, url_validation::validate_target_url},
};
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

/// Manifests are rewritten per request and must never be cached downstream.
const MANIFEST_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Fetch a playlist from origin, rewrite every URI to route back through
/// the proxy, and kick off segment prefetching (media playlists only,
/// fire-and-forget).
pub async fn serve_manifest(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    if !state.config.proxy_enabled {
        return Err(ProxyError::ProxyDisabled);
    }

    let (target, forwarded) = parse_proxy_params(&params)?;
    if !state.config.is_dev {
        // Dev mode permits local origins for testing
        validate_target_url(&target)?;
    }

    info!("Fetching manifest from origin: {}", target);
    let response = origin::get(&state.http_client, &target, &forwarded).await?;
    if !response.status().is_success() {
        metrics::record_origin_error();
        metrics::record_request("manifest", response.status().as_u16());
        return Err(ProxyError::OriginStatus(response.status()));
    }
    let body = response.text().await?;

    let rewritten = rewrite::rewrite_manifest(&body, &target, &forwarded, &state.config.base_url);

    // The rewritten text goes back to the player before any prefetch runs.
    if !rewritten.discovered.is_empty() {
        prefetch::spawn_prefetch(
            state.http_client.clone(),
            state.cache.clone(),
            rewritten.discovered,
            forwarded,
        );
    }

    metrics::record_request("manifest", 200);
    metrics::record_duration("manifest", start);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HLS_CONTENT_TYPE),
            (header::CACHE_CONTROL, MANIFEST_CACHE_CONTROL),
        ],
        rewritten.text,
    )
        .into_response())
}
