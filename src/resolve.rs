//! Absolute-URL resolution for playlist lines.
//!
//! Playlist URIs come in every flavor: absolute, relative path, query-only,
//! protocol-relative. With a base URL available we defer to standard
//! relative-reference resolution; without one we fall back to a permissive
//! scheme-and-host extraction so bare `host/path` inputs still resolve.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Failure to turn a playlist URI into an absolute URL.
///
/// Callers treat this as a local, recoverable condition (the line is left
/// unrewritten); it never propagates to a client response.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unparsable URI: {0}")]
    Unparsable(String),
    #[error("URI has no host: {0}")]
    EmptyHost(String),
}

/// Loose `scheme://host:port/tail` extraction for base-less resolution.
/// Host is mandatory; scheme, `//`, port (0-5 digits) and tail are optional.
static LOOSE_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([a-zA-Z][a-zA-Z0-9+-]*):)?(?://)?([^/:?#\s]+)(?::(\d{0,5}))?([/?]\S*)?$")
        .expect("valid loose URI regex")
});

/// Resolve `uri` into a normalized absolute [`Url`].
///
/// With a base, this is standard relative-reference resolution: absolute
/// inputs come back unchanged, everything else joins against `base`.
/// Without a base, the loose pattern extracts scheme/host/port/tail and a
/// missing scheme defaults to `http` (or `https` when the port is `443`).
pub fn resolve(uri: &str, base: Option<&str>) -> Result<Url, ResolveError> {
    let resolved = match base {
        Some(base) => {
            let base = Url::parse(base).map_err(|_| ResolveError::Unparsable(base.to_string()))?;
            base.join(uri)
                .map_err(|_| ResolveError::Unparsable(uri.to_string()))?
        }
        None => resolve_without_base(uri)?,
    };

    if resolved.host_str().is_none_or(str::is_empty) {
        return Err(ResolveError::EmptyHost(uri.to_string()));
    }

    Ok(resolved)
}

fn resolve_without_base(uri: &str) -> Result<Url, ResolveError> {
    // Inputs claiming http(s) must survive structured parsing as-is.
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return match Url::parse(uri) {
            Ok(parsed) => Ok(parsed),
            Err(url::ParseError::EmptyHost) => Err(ResolveError::EmptyHost(uri.to_string())),
            Err(_) => Err(ResolveError::Unparsable(uri.to_string())),
        };
    }

    let caps = LOOSE_URI
        .captures(uri)
        .ok_or_else(|| ResolveError::Unparsable(uri.to_string()))?;

    let mut scheme = caps.get(1).map(|m| m.as_str());
    let mut host = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let mut port = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    let tail = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

    // A dotless `host:port` input puts the host in the scheme slot and the
    // port digits in the host slot (e.g. `localhost:3000/x`); shift them back.
    if let Some(claimed) = scheme {
        if port.is_empty() && host.len() <= 5 && host.bytes().all(|b| b.is_ascii_digit()) {
            port = host;
            host = claimed;
            scheme = None;
        }
    }

    let scheme = match scheme {
        Some(scheme) => scheme.to_string(),
        None if port == "443" => "https".to_string(),
        None => "http".to_string(),
    };

    let rebuilt = if port.is_empty() {
        format!("{scheme}://{host}{tail}")
    } else {
        format!("{scheme}://{host}:{port}{tail}")
    };

    match Url::parse(&rebuilt) {
        Ok(parsed) => Ok(parsed),
        Err(url::ParseError::EmptyHost) => Err(ResolveError::EmptyHost(uri.to_string())),
        Err(_) => Err(ResolveError::Unparsable(uri.to_string())),
    }
}
