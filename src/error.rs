//! Error taxonomy for the proxy surface.
//!
//! Validation problems surface as 400, a disabled proxy as 404, origin
//! failures as the origin's status (or 500 for transport errors), and
//! anything unexpected as a generic 500. Prefetch and URL-resolution
//! failures never reach this type; they are recovered locally.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("missing required query parameter '{0}'")]
    MissingParam(&'static str),

    #[error("invalid headers JSON: {0}")]
    InvalidHeaders(#[from] serde_json::Error),

    #[error("invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("proxying is disabled")]
    ProxyDisabled,

    #[error("origin fetch failed: {0}")]
    OriginFetch(#[from] reqwest::Error),

    #[error("origin returned {0}")]
    OriginStatus(reqwest::StatusCode),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingParam(_) | Self::InvalidHeaders(_) | Self::InvalidTarget(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ProxyDisabled => StatusCode::NOT_FOUND,
            Self::OriginFetch(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OriginStatus(code) => {
                StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
