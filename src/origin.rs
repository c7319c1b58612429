//! Origin GET requests with the proxy's default header merge.
//!
//! Every request to an origin CDN carries a browser-like `User-Agent`
//! unless the caller forwarded its own; caller-supplied headers always win.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use std::collections::HashMap;
use tracing::warn;

/// Identifying header sent to origins when the caller supplies none.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// GET `url` from origin with the default + forwarded header merge.
pub async fn get(
    client: &Client,
    url: &str,
    forwarded: &HashMap<String, String>,
) -> Result<Response, reqwest::Error> {
    client.get(url).headers(merged_headers(forwarded)).send().await
}

/// Build the outgoing header set: the default `User-Agent`, overridden by
/// any forwarded headers. Unrepresentable names or values are skipped.
pub fn merged_headers(forwarded: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

    for (name, value) in forwarded {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("Skipping forwarded header with invalid name: {}", name);
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            warn!("Skipping forwarded header with invalid value: {}", name);
            continue;
        };
        headers.insert(name, value);
    }
    headers
}

/// Capture a response's headers as a plain map with lower-cased names,
/// dropping values that are not valid UTF-8.
pub fn header_snapshot(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
