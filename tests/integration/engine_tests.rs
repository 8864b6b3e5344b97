//! Boundary operations: validation, envelopes, rate limiting and admin controls

use crate::common::{article, spa_shell, test_config, StubRenderer};
use hivecrawl::api::{CrawlRequest, ScrapeRequest, ScrapeRequestOptions, SearchRequest};
use hivecrawl::config::Config;
use hivecrawl::extractor::{build_http_client, HttpFetcher};
use hivecrawl::search::DuckDuckGo;
use hivecrawl::{ApiResponse, Engine, Method};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT: &str = "127.0.0.1";

fn engine(config: Config, renderer: &StubRenderer) -> Engine {
    let client = build_http_client(&config.extractor).expect("Failed to build HTTP client");
    let fetcher = HttpFetcher::new(client.clone(), config.extractor.max_content_bytes);
    let search = DuckDuckGo::new(client, config.search.clone());
    Engine::with_components(config, Arc::new(fetcher), Arc::new(renderer.clone()), Arc::new(search))
}

fn scrape(url: &str) -> ScrapeRequest {
    ScrapeRequest {
        url: Some(url.to_string()),
        ..Default::default()
    }
}

async fn mount_article(server: &MockServer, page: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article("Guide", &[]), "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scrape_returns_markdown_envelope() {
    let server = MockServer::start().await;
    mount_article(&server, "/guide").await;
    let engine = engine(test_config(&server.uri()), &StubRenderer::new());

    let url = format!("{}/guide", server.uri());
    let response = ApiResponse::from_result(engine.scrape(CLIENT, scrape(&url)).await);
    assert!(response.success);
    assert_eq!(response.status(), 200);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["data"]["url"], url);
    assert_eq!(json["data"]["title"], "Guide");
    assert_eq!(json["data"]["metadata"]["method"], "static");
    assert!(json["data"]["markdown"].as_str().unwrap().contains("# Guide"));
    assert!(json["data"].get("html").is_none());
    assert!(json["error"].is_null());
}

#[tokio::test]
async fn test_scrape_html_format_and_forced_render_screenshot() {
    let server = MockServer::start().await;
    let renderer = StubRenderer::new();
    let url = format!("{}/app", server.uri());
    renderer.serve(&url, &article("App", &[]));
    let engine = engine(test_config(&server.uri()), &renderer);

    let request = ScrapeRequest {
        url: Some(url.clone()),
        format: Some("html".to_string()),
        options: ScrapeRequestOptions {
            screenshot: true,
            force_method: Some(Method::Rendered),
            ..Default::default()
        },
    };

    let response = engine.scrape(CLIENT, request).await.expect("Scrape should succeed");
    assert_eq!(response.metadata.method, Method::Rendered);
    assert!(response.html.as_deref().unwrap().contains("<h1>App</h1>"));
    assert!(response.markdown.is_none());
    assert!(response.screenshot.is_some());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_scrape_input_errors() {
    let server = MockServer::start().await;
    let engine = engine(test_config(&server.uri()), &StubRenderer::new());

    let err = engine
        .scrape(CLIENT, ScrapeRequest::default())
        .await
        .expect_err("Missing URL should be rejected");
    assert_eq!(err.code(), "MISSING_PARAMETER");
    assert_eq!(err.to_string(), "URL is required");

    let err = engine
        .scrape(CLIENT, scrape("ftp://files.example.com/a.txt"))
        .await
        .expect_err("Non-HTTP scheme should be rejected");
    assert_eq!(err.code(), "INVALID_URL");

    let mut request = scrape(&format!("{}/guide", server.uri()));
    request.format = Some("pdf".to_string());
    let err = engine
        .scrape(CLIENT, request)
        .await
        .expect_err("Unknown format should be rejected");
    assert_eq!(err.code(), "UNSUPPORTED_FORMAT");

    let response: ApiResponse<()> = ApiResponse::failure(&err);
    assert_eq!(response.status(), 400);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_private_hosts_blocked_by_default() {
    let server = MockServer::start().await;
    mount_article(&server, "/guide").await;

    let mut config = test_config(&server.uri());
    config.security.allow_private_hosts = false;
    let engine = engine(config, &StubRenderer::new());

    for target in [
        format!("{}/guide", server.uri()),
        "http://localhost/".to_string(),
        "http://192.168.1.10/".to_string(),
    ] {
        let err = engine
            .scrape(CLIENT, scrape(&target))
            .await
            .expect_err("Private host should be rejected");
        assert_eq!(err.code(), "INVALID_URL", "target {}", target);
    }

    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_scrape_failure_is_scrape_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(spa_shell(), "text/html"))
        .mount(&server)
        .await;
    let engine = engine(test_config(&server.uri()), &StubRenderer::new());

    let result = engine.scrape(CLIENT, scrape(&format!("{}/app", server.uri()))).await;
    let response = ApiResponse::from_result(result);
    assert!(!response.success);
    assert_eq!(response.status(), 500);

    let error = response.error.expect("Failure should carry an error");
    assert_eq!(error.code, "SCRAPE_FAILED");
    assert!(error.message.starts_with("Failed to scrape URL"));
}

#[tokio::test]
async fn test_crawl_limits_are_validated() {
    let server = MockServer::start().await;
    let engine = engine(test_config(&server.uri()), &StubRenderer::new());
    let url = Some(format!("{}/", server.uri()));

    let err = engine
        .crawl(
            CLIENT,
            CrawlRequest {
                url: url.clone(),
                max_pages: Some(0),
                ..Default::default()
            },
        )
        .await
        .expect_err("maxPages of zero should be rejected");
    assert_eq!(err.code(), "INVALID_PARAMETER");

    let err = engine
        .crawl(
            CLIENT,
            CrawlRequest {
                url,
                max_depth: Some(6),
                ..Default::default()
            },
        )
        .await
        .expect_err("maxDepth above the limit should be rejected");
    assert_eq!(err.to_string(), "maxDepth must be between 1 and 5");
}

#[tokio::test]
async fn test_crawl_response_shape() {
    let server = MockServer::start().await;
    mount_article(&server, "/guide").await;
    let mut config = test_config(&server.uri());
    config.crawl.fetch_mode = hivecrawl::config::FetchMode::Adaptive;
    let engine = engine(config, &StubRenderer::new());

    let response = engine
        .crawl(
            CLIENT,
            CrawlRequest {
                url: Some(format!("{}/guide", server.uri())),
                max_pages: Some(5),
                max_depth: Some(1),
                ..Default::default()
            },
        )
        .await
        .expect("Crawl should succeed");

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["metadata"]["totalPages"], 1);
    assert_eq!(json["metadata"]["failedPages"], 0);
    assert_eq!(json["pages"][0]["depth"], 0);
    assert_eq!(json["pages"][0]["title"], "Guide");
    assert!(json["pages"][0]["markdown"].as_str().unwrap().contains("# Guide"));
}

#[tokio::test]
async fn test_search_input_errors() {
    let server = MockServer::start().await;
    let engine = engine(test_config(&server.uri()), &StubRenderer::new());

    let err = engine
        .search(CLIENT, SearchRequest {
            q: Some("   ".to_string()),
            ..Default::default()
        })
        .await
        .expect_err("Blank query should be rejected");
    assert_eq!(err.code(), "MISSING_PARAMETER");

    for limit in [0, 51] {
        let err = engine
            .search(CLIENT, SearchRequest {
                q: Some("rust".to_string()),
                limit: Some(limit),
                ..Default::default()
            })
            .await
            .expect_err("Out-of-range limit should be rejected");
        assert_eq!(err.code(), "INVALID_PARAMETER");
        assert_eq!(err.to_string(), "Limit must be between 1 and 50");
    }
}

#[tokio::test]
async fn test_exhausted_reservoir_rejects_in_hard_ceiling_mode() {
    let server = MockServer::start().await;
    mount_article(&server, "/guide").await;

    let mut config = test_config(&server.uri());
    config.limiter.reservoir = 1;
    config.limiter.refill_amount = 1;
    config.limiter.refill_interval_ms = 60_000;
    config.limiter.reject_when_exhausted = true;
    let engine = engine(config, &StubRenderer::new());
    let url = format!("{}/guide", server.uri());

    engine
        .scrape(CLIENT, scrape(&url))
        .await
        .expect("First request should be admitted");

    let err = engine
        .scrape(CLIENT, scrape(&url))
        .await
        .expect_err("Second request should be rejected");
    assert_eq!(err.code(), "RATE_LIMITED");
    assert_eq!(ApiResponse::<()>::failure(&err).status(), 429);

    // Other clients have their own reservoir
    engine
        .scrape("10.0.0.2", scrape(&url))
        .await
        .expect("Another client should be admitted");

    assert_eq!(engine.limiter_info(CLIENT).await.reservoir, 0);
    assert!(engine.reset_client(CLIENT));
    assert_eq!(engine.limiter_info(CLIENT).await.reservoir, 1);
    engine
        .scrape(CLIENT, scrape(&url))
        .await
        .expect("Reset client should be admitted again");
}

#[tokio::test]
async fn test_cache_admin_and_shutdown() {
    let server = MockServer::start().await;
    mount_article(&server, "/guide").await;
    let renderer = StubRenderer::new();
    let engine = engine(test_config(&server.uri()), &renderer);

    engine
        .scrape(CLIENT, scrape(&format!("{}/guide", server.uri())))
        .await
        .expect("Scrape should succeed");

    let stats = engine.cache_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.misses, 1);
    let entry = engine.cache().entry("127.0.0.1").expect("Domain should be cached");
    assert_eq!(entry.method, Method::Static);

    assert!(!engine.invalidate_domain("unknown.example.com"));
    assert!(engine.invalidate_domain("127.0.0.1"));
    assert_eq!(engine.cache_stats().entries, 0);

    engine.cache().record("example.com", Method::Rendered);
    engine.invalidate_all();
    assert!(engine.cache().is_empty());

    engine.shutdown().await.expect("Shutdown should succeed");
    assert!(renderer.was_shut_down());
}
