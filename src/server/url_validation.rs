use crate::error::ProxyError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Validate that a user-supplied target URL is safe to fetch (SSRF guard).
///
/// Accepts only `http://` and `https://` URLs with a non-private host.
/// IP literals are checked against blocked ranges; hostnames are accepted
/// without DNS resolution (DNS rebinding is an accepted limitation here).
///
/// # Errors
/// Returns [`ProxyError::InvalidTarget`] for invalid or relative URLs,
/// non-HTTP(S) schemes, and private/reserved IP literals.
pub fn validate_target_url(url: &str) -> Result<(), ProxyError> {
    let parsed =
        Url::parse(url).map_err(|_| ProxyError::InvalidTarget(format!("invalid URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::InvalidTarget(format!(
                "scheme '{scheme}' not allowed, only http/https"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| ProxyError::InvalidTarget(format!("no host in URL: {url}")))?;

    match host {
        Host::Ipv4(ip) if is_blocked_ipv4(ip) => Err(ProxyError::InvalidTarget(format!(
            "private or reserved IPv4 address not allowed: {ip}"
        ))),
        Host::Ipv6(ip) if is_blocked_ipv6(ip) => Err(ProxyError::InvalidTarget(format!(
            "private or reserved IPv6 address not allowed: {ip}"
        ))),
        _ => Ok(()),
    }
}

/// RFC 1918 private, loopback, link-local (cloud metadata) and the zero
/// network are all refused.
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.octets()[0] == 0
}

/// Loopback, link-local (`fe80::/10`) and unique-local (`fc00::/7`).
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback() || (first & 0xffc0) == 0xfe80 || (first & 0xfe00) == 0xfc00
}
