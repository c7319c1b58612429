use crate::{
    error::{ProxyError, Result},
    metrics, origin,
    server::{handlers::parse_proxy_params, state::AppState, url_validation::validate_target_url},
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

/// Fallback content type when the origin never told us.
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Segments are immutable; let players and intermediaries cache them.
const SEGMENT_CACHE_CONTROL: &str = "public, max-age=3600";

/// Serve a segment or key payload: from the cache when the prefetcher got
/// there first, otherwise straight from origin.
///
/// Cache-miss fetches are returned without being written back — only the
/// prefetcher populates the cache.
pub async fn serve_segment(
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

    if let Some(entry) = state.cache.get(&target) {
        metrics::record_cache_hit();
        metrics::record_request("segment", 200);
        metrics::record_duration("segment", start);

        let content_type = entry
            .content_type()
            .unwrap_or(SEGMENT_CONTENT_TYPE)
            .to_string();
        return Ok(segment_response(content_type, Body::from(entry.payload)));
    }
    metrics::record_cache_miss();

    info!("Fetching segment from origin: {}", target);
    let response = origin::get(&state.http_client, &target, &forwarded).await?;
    if !response.status().is_success() {
        metrics::record_origin_error();
        metrics::record_request("segment", response.status().as_u16());
        return Err(ProxyError::OriginStatus(response.status()));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(SEGMENT_CONTENT_TYPE)
        .to_string();
    let bytes = response.bytes().await?;

    metrics::record_request("segment", 200);
    metrics::record_duration("segment", start);

    Ok(segment_response(content_type, Body::from(bytes)))
}

fn segment_response(content_type: String, body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, SEGMENT_CACHE_CONTROL.to_string()),
        ],
        body,
    )
        .into_response()
}
