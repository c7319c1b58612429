pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::cache;
use crate::config::Config;
use axum::http::{HeaderName, HeaderValue};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusBuilder;
use state::AppState;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

/// Build the router with all routes, permissive CORS, and the version
/// header. Metrics exposure and the cache janitor are wired in [`start`]
/// so tests can drive the router without background tasks.
pub fn build_router(config: Config) -> Router {
    build_router_with_state(AppState::new(config))
}

pub fn build_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/m3u8-proxy", get(handlers::manifest::serve_manifest))
        .route("/ts-proxy", get(handlers::segment::serve_segment))
        .route("/cache-stats", get(handlers::stats::cache_stats))
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-hls-proxy-version"),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        ))
        .with_state(state)
}

/// Start the Axum HTTP server, the Prometheus recorder, and the cache
/// janitor. The janitor is cancelled when the server loop exits.
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(config);

    let shutdown = CancellationToken::new();
    let janitor = cache::spawn_janitor(
        state.cache.clone(),
        state.config.janitor_interval,
        shutdown.clone(),
    );

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    let app = build_router_with_state(state).route(
        "/metrics",
        get(move || {
            let handle = metrics_handle.clone();
            async move { handle.render() }
        }),
    );

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    let served = axum::serve(listener, app).await;

    shutdown.cancel();
    let _ = janitor.await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
