pub mod health;
pub mod manifest;
pub mod segment;
pub mod stats;

use crate::error::{ProxyError, Result};
use std::collections::HashMap;

/// Extract the shared `url` + `headers` query parameters.
///
/// `url` is required; `headers` is an optional JSON object of extra headers
/// forwarded to origin. Malformed JSON is a client error, not ignored.
pub(crate) fn parse_proxy_params(
    params: &HashMap<String, String>,
) -> Result<(String, HashMap<String, String>)> {
    let target = params
        .get("url")
        .ok_or(ProxyError::MissingParam("url"))?
        .clone();

    let forwarded = match params.get("headers") {
        Some(raw) => serde_json::from_str(raw)?,
        None => HashMap::new(),
    };

    Ok((target, forwarded))
}
