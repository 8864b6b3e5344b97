//! Single-page extraction against a mock site
//!
//! The static path goes over real HTTP to wiremock; the rendered path is served
//! by the stub renderer.

use crate::common::{article, spa_shell, test_config, StubRenderer};
use hivecrawl::extractor::{ExtractOptions, Extractor, HttpFetcher, StaticFetch};
use hivecrawl::{FetchError, Method, MethodCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

fn extractor(server: &MockServer, renderer: &StubRenderer) -> Extractor {
    let config = test_config(&server.uri());
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");
    Extractor::new(
        Arc::new(fetcher),
        Arc::new(renderer.clone()),
        Arc::new(MethodCache::new(Duration::from_secs(3600))),
        config.extractor.timeout(),
    )
}

fn page_url(server: &MockServer, page: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), page)).expect("Failed to parse page URL")
}

#[tokio::test]
async fn test_server_rendered_page_uses_static_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html(article("Ownership", &["/blog/next".to_string()])))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = StubRenderer::new();
    let extractor = extractor(&server, &renderer);
    let url = page_url(&server, "/blog/post");

    let extraction = extractor
        .extract(&url, &ExtractOptions::default())
        .await
        .expect("Extraction should succeed");

    let page = extraction.page;
    assert_eq!(page.metadata.method, Method::Static);
    assert_eq!(page.metadata.status_code, 200);
    assert_eq!(page.title, "Ownership");
    assert!(page.text_content.contains("rendered on the server"));
    assert!(page
        .links
        .iter()
        .any(|l| l.absolute_href == page_url(&server, "/blog/next").as_str()));
    assert_eq!(page.images.len(), 1);
    assert!(extraction.screenshot.is_none());

    assert_eq!(extractor.cache().lookup("127.0.0.1"), Some(Method::Static));
    assert_eq!(renderer.sessions(), 0);
}

#[tokio::test]
async fn test_empty_shell_falls_back_to_renderer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(html(spa_shell()))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = StubRenderer::new();
    let url = page_url(&server, "/app");
    renderer.serve(url.as_str(), &article("Dashboard", &[]));
    let extractor = extractor(&server, &renderer);

    let extraction = extractor
        .extract(&url, &ExtractOptions::default())
        .await
        .expect("Rendered fallback should succeed");

    assert_eq!(extraction.page.metadata.method, Method::Rendered);
    assert_eq!(extraction.page.title, "Dashboard");
    assert_eq!(renderer.sessions(), 1);
    assert_eq!(renderer.closes(), 1);
    assert_eq!(extractor.cache().lookup("127.0.0.1"), Some(Method::Rendered));
}

#[tokio::test]
async fn test_domain_cached_as_rendered_skips_static_fetch() {
    let server = MockServer::start().await;
    // Only the first extraction may reach the server
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(html(spa_shell()))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = StubRenderer::new();
    let url = page_url(&server, "/app");
    renderer.serve(url.as_str(), &article("Dashboard", &[]));
    let extractor = extractor(&server, &renderer);

    for _ in 0..2 {
        let extraction = extractor
            .extract(&url, &ExtractOptions::default())
            .await
            .expect("Extraction should succeed");
        assert_eq!(extraction.page.metadata.method, Method::Rendered);
    }

    assert_eq!(renderer.renders(), 2);
    let entry = extractor.cache().entry("127.0.0.1").expect("Domain should be cached");
    assert_eq!(entry.success_count, 2);
}

#[tokio::test]
async fn test_not_found_falls_back_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<h1>Not found</h1>", "text/html"))
        .mount(&server)
        .await;

    let renderer = StubRenderer::new();
    let extractor = extractor(&server, &renderer);
    let url = page_url(&server, "/missing");

    let err = extractor
        .extract(&url, &ExtractOptions::default())
        .await
        .expect_err("Both methods should fail");

    assert_eq!(err.code(), "SCRAPE_FAILED");
    assert_eq!(renderer.renders(), 1);
    assert!(extractor.cache().lookup("127.0.0.1").is_none());
}

#[tokio::test]
async fn test_forced_static_surfaces_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let renderer = StubRenderer::new();
    let extractor = extractor(&server, &renderer);
    let options = ExtractOptions {
        force_method: Some(Method::Static),
        ..Default::default()
    };

    let err = extractor
        .extract(&page_url(&server, "/missing"), &options)
        .await
        .expect_err("Forced static fetch of a 404 should fail");

    assert_eq!(err.code(), "SCRAPE_FAILED");
    assert!(err.to_string().contains("HTTP status 404"));
    assert_eq!(renderer.sessions(), 0);
    assert!(extractor.cache().is_empty());
}

#[tokio::test]
async fn test_fetcher_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html(article("Moved", &[])))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");

    let document = fetcher
        .fetch(&page_url(&server, "/old"), Duration::from_secs(2))
        .await
        .expect("Redirect should be followed");

    assert_eq!(document.final_url, page_url(&server, "/new"));
    assert_eq!(document.status_code, 200);
    assert!(document.content_type.starts_with("text/html"));
}

#[tokio::test]
async fn test_fetcher_gives_up_on_redirect_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");

    let err = fetcher
        .fetch(&page_url(&server, "/loop"), Duration::from_secs(2))
        .await
        .expect_err("Redirect loop should fail");

    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn test_fetcher_enforces_size_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(html("x".repeat(4096)))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.extractor.max_content_bytes = 1024;
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");

    let err = fetcher
        .fetch(&page_url(&server, "/huge"), Duration::from_secs(2))
        .await
        .expect_err("Oversized body should be rejected");

    assert_eq!(err, FetchError::TooLarge { size: 4096, max: 1024 });
}

/// Serves one chunked response with no Content-Length, `chunks` chunks of
/// `chunk_size` bytes each
async fn serve_chunked(chunks: usize, chunk_size: usize) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let mut response = b"HTTP/1.1 200 OK\r\n\
            Content-Type: text/html\r\n\
            Transfer-Encoding: chunked\r\n\
            Connection: close\r\n\r\n"
            .to_vec();
        for _ in 0..chunks {
            response.extend_from_slice(format!("{:x}\r\n", chunk_size).as_bytes());
            response.extend(std::iter::repeat(b'x').take(chunk_size));
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"0\r\n\r\n");

        // The client may hang up once it has seen enough
        let _ = stream.write_all(&response).await;
        let _ = stream.shutdown().await;
    });

    Url::parse(&format!("http://{}/stream", addr)).expect("Failed to parse stream URL")
}

#[tokio::test]
async fn test_fetcher_enforces_size_ceiling_on_chunked_body() {
    let url = serve_chunked(8, 512).await;

    let mut config = test_config(url.as_str());
    config.extractor.max_content_bytes = 1024;
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");

    let err = fetcher
        .fetch(&url, Duration::from_secs(2))
        .await
        .expect_err("Oversized streamed body should be rejected");

    match err {
        FetchError::TooLarge { size, max } => {
            assert_eq!(max, 1024);
            assert!(size > 1024 && size <= 4096, "unexpected size {}", size);
        }
        other => panic!("expected TooLarge, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetcher_accepts_chunked_body_under_ceiling() {
    let url = serve_chunked(2, 256).await;

    let mut config = test_config(url.as_str());
    config.extractor.max_content_bytes = 1024;
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");

    let document = fetcher
        .fetch(&url, Duration::from_secs(2))
        .await
        .expect("Small streamed body should be accepted");

    assert_eq!(document.html.len(), 512);
    assert_eq!(document.status_code, 200);
}

#[tokio::test]
async fn test_fetcher_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html(article("Slow", &[])).set_delay(Duration::from_millis(1_000)))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let fetcher = HttpFetcher::from_config(&config.extractor).expect("Failed to build fetcher");

    let err = fetcher
        .fetch(&page_url(&server, "/slow"), Duration::from_millis(100))
        .await
        .expect_err("Slow response should time out");

    assert_eq!(err, FetchError::Timeout { timeout_ms: 100 });
}
