//! Line-by-line HLS manifest rewriting.
//!
//! Rewrites every URI inside a playlist so the player's next request routes
//! back through this proxy, preserving line count and ordering 1:1. Variant
//! and alternate-media references point at the manifest endpoint; segments
//! and encryption keys point at the segment endpoint. Segment URLs found in
//! media playlists are reported back so the caller can kick off prefetching.

use crate::resolve::resolve;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Content type for rewritten manifest responses.
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Route serving rewritten playlists.
pub const MANIFEST_ROUTE: &str = "/m3u8-proxy";
/// Route serving segment and key payloads.
pub const SEGMENT_ROUTE: &str = "/ts-proxy";

/// Marker distinguishing master playlists from media playlists.
///
/// Textual heuristic, not a tag parse: a media playlist that happens to
/// carry this string in a comment is classified as master. Known and kept.
const MASTER_MARKER: &str = "RESOLUTION=";

const KEY_TAG: &str = "#EXT-X-KEY";
const MEDIA_TAG: &str = "#EXT-X-MEDIA";

/// First absolute URL embedded in a directive line (typically `URI="..."`).
static EMBEDDED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"']+"#).expect("valid embedded URL regex"));

/// Result of a manifest rewrite.
pub struct Rewritten {
    /// The rewritten playlist text.
    pub text: String,
    /// Absolute segment/key URLs discovered in a media playlist,
    /// in playlist order. May repeat a URL when the playlist does;
    /// the prefetcher fetches each distinct URL once. Empty for
    /// master playlists.
    pub discovered: Vec<String>,
}

/// Rewrite `manifest` so every playlist, segment, and key URI routes through
/// the proxy at `proxy_base`, carrying `forwarded_headers` as a JSON query
/// parameter. Relative URIs resolve against `request_url`.
pub fn rewrite_manifest(
    manifest: &str,
    request_url: &str,
    forwarded_headers: &HashMap<String, String>,
    proxy_base: &str,
) -> Rewritten {
    let headers_json =
        serde_json::to_string(forwarded_headers).unwrap_or_else(|_| "{}".to_string());
    let is_master = manifest.contains(MASTER_MARKER);

    debug!(
        "Rewriting {} playlist fetched from {}",
        if is_master { "master" } else { "media" },
        request_url
    );

    let mut discovered = Vec::new();
    let text = manifest
        .split('\n')
        .map(|line| {
            if is_master {
                rewrite_master_line(line, request_url, proxy_base, &headers_json)
            } else {
                rewrite_media_line(line, request_url, proxy_base, &headers_json, &mut discovered)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    Rewritten { text, discovered }
}

fn rewrite_master_line(
    line: &str,
    request_url: &str,
    proxy_base: &str,
    headers_json: &str,
) -> String {
    if line.trim().is_empty() {
        return line.to_string();
    }
    if line.starts_with(KEY_TAG) {
        // Keys are opaque binary payloads; fetch them via the segment route.
        return replace_embedded_url(line, proxy_base, SEGMENT_ROUTE, headers_json, &mut None);
    }
    if line.starts_with(MEDIA_TAG) {
        // Alternate media (audio/subtitles) is itself a playlist.
        return replace_embedded_url(line, proxy_base, MANIFEST_ROUTE, headers_json, &mut None);
    }
    if line.starts_with('#') {
        return line.to_string();
    }

    // Variant stream URI.
    match resolve(line.trim(), Some(request_url)) {
        Ok(variant) => {
            proxy_url(proxy_base, MANIFEST_ROUTE, variant.as_str(), headers_json)
                .unwrap_or_else(|| line.to_string())
        }
        Err(e) => {
            debug!("Leaving unresolvable variant line unchanged: {}", e);
            line.to_string()
        }
    }
}

fn rewrite_media_line(
    line: &str,
    request_url: &str,
    proxy_base: &str,
    headers_json: &str,
    discovered: &mut Vec<String>,
) -> String {
    if line.trim().is_empty() {
        return line.to_string();
    }
    if line.starts_with(KEY_TAG) {
        let mut found = Some(discovered);
        return replace_embedded_url(line, proxy_base, SEGMENT_ROUTE, headers_json, &mut found);
    }
    if line.starts_with('#') {
        return line.to_string();
    }

    // Segment URI.
    match resolve(line.trim(), Some(request_url)) {
        Ok(segment) => match proxy_url(proxy_base, SEGMENT_ROUTE, segment.as_str(), headers_json) {
            Some(rewritten) => {
                discovered.push(segment.into());
                rewritten
            }
            None => line.to_string(),
        },
        Err(e) => {
            debug!("Leaving unresolvable segment line unchanged: {}", e);
            line.to_string()
        }
    }
}

/// Replace the first embedded absolute URL in a directive line with a proxy
/// URL; lines without one pass through unchanged. When `discovered` is set,
/// the extracted URL is also registered for prefetching.
fn replace_embedded_url(
    line: &str,
    proxy_base: &str,
    route: &str,
    headers_json: &str,
    discovered: &mut Option<&mut Vec<String>>,
) -> String {
    let Some(found) = EMBEDDED_URL.find(line) else {
        return line.to_string();
    };
    let Some(proxied) = proxy_url(proxy_base, route, found.as_str(), headers_json) else {
        return line.to_string();
    };
    if let Some(discovered) = discovered {
        discovered.push(found.as_str().to_string());
    }
    format!("{}{}{}", &line[..found.start()], proxied, &line[found.end()..])
}

/// Build `{proxy_base}{route}?url=...&headers=...` with form-urlencoded
/// query values. `None` only when `proxy_base` itself is unparsable.
fn proxy_url(proxy_base: &str, route: &str, target: &str, headers_json: &str) -> Option<String> {
    let mut proxied = Url::parse(proxy_base).ok()?;
    proxied.set_path(route);
    proxied.set_query(None);
    proxied
        .query_pairs_mut()
        .append_pair("url", target)
        .append_pair("headers", headers_json);
    Some(proxied.into())
}
