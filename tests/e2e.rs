//! End-to-end tests for the rewriting proxy.
//!
//! Starts a real Axum server on a random port with a wiremock origin behind
//! it, and exercises the full manifest → rewrite → prefetch → segment flow.

use hls_proxy::config::Config;
use hls_proxy::server::build_router;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test server helpers ───────────────────────────────────────────────────────

/// Spin up the proxy on a random port. `base_url` points at the server
/// itself so rewritten playlist URIs route back through it.
async fn start_proxy(adjust: impl FnOnce(&mut Config)) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let mut config = Config {
        port: 0,
        base_url: format!("http://{addr}"),
        // Dev mode: the SSRF guard would reject the loopback mock origin
        is_dev: true,
        proxy_enabled: true,
        cache_enabled: true,
        cache_capacity: 2000,
        cache_ttl: Duration::from_secs(2 * 60 * 60),
        janitor_interval: Duration::from_secs(30 * 60),
    };
    adjust(&mut config);

    let app = build_router(config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn proxy_query(addr: SocketAddr, route: &str, target: &str) -> String {
    let mut url = Url::parse(&format!("http://{addr}{route}")).unwrap();
    url.query_pairs_mut().append_pair("url", target);
    url.into()
}

/// Poll `/cache-stats` until `entries` reaches `want` or time runs out.
async fn wait_for_cache_entries(client: &reqwest::Client, addr: SocketAddr, want: u64) {
    for _ in 0..200 {
        let stats: serde_json::Value = client
            .get(format!("http://{addr}/cache-stats"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if stats["entries"] == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cache never reached {want} entries");
}

/// Number of origin requests received for a given path.
async fn origin_hits(origin: &MockServer, want_path: &str) -> usize {
    origin
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == want_path)
        .count()
}

// ── Master playlist rewriting ─────────────────────────────────────────────────

#[tokio::test]
async fn master_playlist_variants_routed_through_proxy() {
    let origin = MockServer::start().await;
    let master = "#EXTM3U\n\
                  #EXT-X-STREAM-INF:RESOLUTION=1920x1080\n\
                  hi.m3u8\n\
                  #EXT-X-STREAM-INF:RESOLUTION=640x360\n\
                  lo.m3u8\n";
    Mock::given(method("GET"))
        .and(path("/a/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(master))
        .mount(&origin)
        .await;

    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();

    let target = format!("{}/a/master.m3u8", origin.uri());
    let resp = client
        .get(proxy_query(addr, "/m3u8-proxy", &target))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );

    let body = resp.text().await.unwrap();
    let lines: Vec<&str> = body.split('\n').collect();
    assert_eq!(lines.len(), 6, "line count preserved");
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "#EXT-X-STREAM-INF:RESOLUTION=1920x1080");
    assert_eq!(lines[3], "#EXT-X-STREAM-INF:RESOLUTION=640x360");

    // Variant lines route back through this proxy, carrying the resolved
    // origin URL and the (empty) header set as urlencoded query params
    for (line, variant) in [(lines[2], "hi.m3u8"), (lines[4], "lo.m3u8")] {
        assert!(
            line.starts_with(&format!("http://{addr}/m3u8-proxy?url=http%3A%2F%2F")),
            "unexpected variant line: {line}"
        );
        let rewritten = Url::parse(line).unwrap();
        let params: std::collections::HashMap<String, String> =
            rewritten.query_pairs().into_owned().collect();
        assert_eq!(params["url"], format!("{}/a/{variant}", origin.uri()));
        assert_eq!(params["headers"], "{}");
    }
}

// ── Media playlist prefetch and cache ─────────────────────────────────────────

#[tokio::test]
async fn media_playlist_prefetches_segments_into_cache() {
    let origin = MockServer::start().await;
    let media = "#EXTM3U\n\
                 #EXT-X-TARGETDURATION:6\n\
                 #EXTINF:6.0,\n\
                 seg0.ts\n\
                 #EXTINF:6.0,\n\
                 seg1.ts\n\
                 #EXT-X-ENDLIST\n";
    Mock::given(method("GET"))
        .and(path("/live/media.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(media))
        .mount(&origin)
        .await;
    for seg in ["seg0.ts", "seg1.ts"] {
        Mock::given(method("GET"))
            .and(path(format!("/live/{seg}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(seg.as_bytes().to_vec())
                    .insert_header("Content-Type", "video/mp2t"),
            )
            .mount(&origin)
            .await;
    }

    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();

    let target = format!("{}/live/media.m3u8", origin.uri());
    let resp = client
        .get(proxy_query(addr, "/m3u8-proxy", &target))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = resp.text().await.unwrap();
    assert!(body.contains("/ts-proxy?url="), "segments rewritten: {body}");

    // Prefetch is detached; wait for both segments to land
    wait_for_cache_entries(&client, addr, 2).await;
    assert_eq!(origin_hits(&origin, "/live/seg0.ts").await, 1);

    // Segment served from cache — no further origin fetch
    let seg_url = format!("{}/live/seg0.ts", origin.uri());
    let resp = client
        .get(proxy_query(addr, "/ts-proxy", &seg_url))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp2t");
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"seg0.ts");
    assert_eq!(origin_hits(&origin, "/live/seg0.ts").await, 1);
}

// ── Segment server asymmetry ──────────────────────────────────────────────────

#[tokio::test]
async fn segment_miss_fetches_origin_without_caching() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/seg.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"raw-bytes".to_vec())
                .insert_header("Content-Type", "application/octet-stream"),
        )
        .mount(&origin)
        .await;

    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();
    let seg_url = format!("{}/s/seg.ts", origin.uri());

    let resp = client
        .get(proxy_query(addr, "/ts-proxy", &seg_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    // Miss path passes the origin's content-type through
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/octet-stream"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"raw-bytes");
    assert_eq!(origin_hits(&origin, "/s/seg.ts").await, 1);

    // Only the prefetcher populates the cache; a miss-path fetch does not
    let stats: serde_json::Value = client
        .get(format!("http://{addr}/cache-stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["entries"], 0);

    // A second request misses again and refetches
    let resp = client
        .get(proxy_query(addr, "/ts-proxy", &seg_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(origin_hits(&origin, "/s/seg.ts").await, 2);
}

// ── Validation short-circuits the origin ──────────────────────────────────────

#[tokio::test]
async fn malformed_headers_json_never_reaches_origin() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&origin)
        .await;

    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();

    let mut url = Url::parse(&format!("http://{addr}/m3u8-proxy")).unwrap();
    url.query_pairs_mut()
        .append_pair("url", &format!("{}/a.m3u8", origin.uri()))
        .append_pair("headers", "{bad json");

    let resp = client.get(url).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    assert!(origin.received_requests().await.unwrap_or_default().is_empty());
}

// ── Forwarded headers reach the origin ────────────────────────────────────────

#[tokio::test]
async fn forwarded_headers_merge_over_default_user_agent() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
        .mount(&origin)
        .await;

    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();

    let mut url = Url::parse(&format!("http://{addr}/m3u8-proxy")).unwrap();
    url.query_pairs_mut()
        .append_pair("url", &format!("{}/a.m3u8", origin.uri()))
        .append_pair(
            "headers",
            r#"{"Referer":"https://site.example/","User-Agent":"player/1.0"}"#,
        );

    let resp = client.get(url).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let requests = origin.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert_eq!(headers.get("referer").unwrap(), "https://site.example/");
    assert_eq!(headers.get("user-agent").unwrap(), "player/1.0");
}

// ── Origin failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn origin_error_status_propagates() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&origin)
        .await;

    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(proxy_query(
            addr,
            "/m3u8-proxy",
            &format!("{}/a.m3u8", origin.uri()),
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn origin_transport_failure_is_500() {
    let addr = start_proxy(|_| {}).await;
    let client = reqwest::Client::new();

    // TCP port 9 (discard) — nothing listens there
    let resp = client
        .get(proxy_query(addr, "/ts-proxy", "http://127.0.0.1:9/seg.ts"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
}

// ── Cache disabled ────────────────────────────────────────────────────────────

#[tokio::test]
async fn disabled_cache_always_fetches_origin() {
    let origin = MockServer::start().await;
    let media = "#EXTM3U\n#EXTINF:6.0,\nseg0.ts\n";
    Mock::given(method("GET"))
        .and(path("/live/media.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(media))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/live/seg0.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&origin)
        .await;

    let addr = start_proxy(|config| config.cache_enabled = false).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(proxy_query(
            addr,
            "/m3u8-proxy",
            &format!("{}/live/media.m3u8", origin.uri()),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The prefetcher is a no-op with the cache disabled
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(origin_hits(&origin, "/live/seg0.ts").await, 0);

    // Segment requests fall through to origin every time
    let seg_url = format!("{}/live/seg0.ts", origin.uri());
    for expected_hits in 1..=2 {
        let resp = client
            .get(proxy_query(addr, "/ts-proxy", &seg_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(origin_hits(&origin, "/live/seg0.ts").await, expected_hits);
    }
}
