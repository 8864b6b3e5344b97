//! DuckDuckGo backend against a mock search frontend

use crate::common::test_config;
use hivecrawl::extractor::build_http_client;
use hivecrawl::search::{DuckDuckGo, SearchMethod, WebSearch};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS_PAGE: &str = r#"<html><body>
  <div class="result">
    <h2 class="result__title"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&rut=1">Rust Programming Language</a></h2>
    <a class="result__snippet">A language empowering everyone.</a>
  </div>
  <div class="result">
    <h2 class="result__title"><a class="result__a" href="https://doc.rust-lang.org/book/">The Rust Book</a></h2>
    <a class="result__snippet">Learn Rust from the ground up.</a>
  </div>
</body></html>"#;

const LITE_PAGE: &str = r#"<html><body><table>
  <tr><td><a class="result-link" href="https://tokio.rs/">Tokio</a></td></tr>
  <tr><td class="result-snippet">An asynchronous runtime.</td></tr>
</table></body></html>"#;

const NO_RESULTS: &str = "<html><body><div class=\"no-results\">No results.</div></body></html>";

fn backend(server: &MockServer) -> DuckDuckGo {
    let config = test_config(&server.uri());
    let client = build_http_client(&config.extractor).expect("Failed to build HTTP client");
    DuckDuckGo::new(client, config.search)
}

fn page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

#[tokio::test]
async fn test_html_frontend_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "rust lang"))
        .and(query_param("kl", "us-en"))
        .respond_with(page(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .search("rust lang", 10, "us-en")
        .await
        .expect("Search should succeed");

    assert_eq!(response.query, "rust lang");
    assert_eq!(response.metadata.method, SearchMethod::Html);
    assert_eq!(response.metadata.count, 2);
    assert_eq!(response.metadata.region, "us-en");
    assert_eq!(response.results[0].url, "https://www.rust-lang.org/");
    assert_eq!(response.results[1].title, "The Rust Book");
    assert_eq!(response.results[1].position, 2);
}

#[tokio::test]
async fn test_limit_truncates_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(page(RESULTS_PAGE))
        .mount(&server)
        .await;

    let response = backend(&server)
        .search("rust", 1, "wt-wt")
        .await
        .expect("Search should succeed");

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.metadata.count, 1);
}

#[tokio::test]
async fn test_retries_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(page(RESULTS_PAGE))
        .mount(&server)
        .await;

    let response = backend(&server)
        .search("rust", 10, "wt-wt")
        .await
        .expect("Second attempt should succeed");

    assert_eq!(response.metadata.method, SearchMethod::Html);
    assert_eq!(response.results.len(), 2);
}

#[tokio::test]
async fn test_lite_frontend_after_blocked_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lite/"))
        .and(query_param("q", "tokio"))
        .respond_with(page(LITE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .search("tokio", 10, "wt-wt")
        .await
        .expect("Lite fallback should succeed");

    assert_eq!(response.metadata.method, SearchMethod::Html);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].title, "Tokio");
    assert_eq!(response.results[0].snippet, "An asynchronous runtime.");
}

#[tokio::test]
async fn test_instant_answer_when_frontends_are_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(page(NO_RESULTS))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lite/"))
        .respond_with(page(NO_RESULTS))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "rust"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "Heading": "Rust (programming language)",
                "Abstract": "Rust is a general-purpose programming language.",
                "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
                "Results": [],
                "RelatedTopics": [
                    {"Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                    {"Name": "See also", "Topics": []}
                ]
            }"#,
            "application/x-javascript",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .search("rust", 10, "wt-wt")
        .await
        .expect("Instant answer fallback should succeed");

    assert_eq!(response.metadata.method, SearchMethod::InstantAnswer);
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].title, "Rust (programming language)");
    assert_eq!(
        response.results[0].url,
        "https://en.wikipedia.org/wiki/Rust_(programming_language)"
    );
    assert_eq!(response.results[1].title, "Cargo");
    assert_eq!(response.results[1].position, 2);
}

#[tokio::test]
async fn test_all_backends_failing_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend(&server)
        .search("rust", 10, "wt-wt")
        .await
        .expect_err("Search should fail when every backend fails");

    assert_eq!(err.code(), "SEARCH_FAILED");
}
