//! Edge rewriting proxy for HLS manifests and their media segments.
//!
//! Players request manifests and segments through this proxy instead of
//! cross-origin. Manifest URIs are rewritten to route back here, and
//! discovered segment URLs are prefetched into a bounded TTL cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod origin;
pub mod prefetch;
pub mod resolve;
pub mod rewrite;
pub mod server;
