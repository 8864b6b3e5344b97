//! Static HTTP fetcher
//!
//! This module handles the cheap extraction path:
//! - Building one shared HTTP client with browser-like headers
//! - Following a bounded number of redirects
//! - Enforcing a response size ceiling while the body streams in
//! - Classifying failures (timeout vs. everything else)

use crate::config::ExtractorConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, DNT, UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use tracing::trace;
use url::Url;

/// A document retrieved without executing scripts
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Final URL after redirects
    pub final_url: Url,
    /// Response body decoded as UTF-8
    pub html: String,
    pub status_code: u16,
    /// Content-Type header value, `text/html` when absent
    pub content_type: String,
    pub headers: HeaderMap,
}

/// A non-rendering HTTP GET
#[async_trait]
pub trait StaticFetch: Send + Sync {
    /// Fetches `url`, failing with `FetchError::Timeout` once `timeout` elapses
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError>;
}

/// Builds an HTTP client with browser-like defaults
///
/// # Example
///
/// ```
/// use hivecrawl::config::ExtractorConfig;
/// use hivecrawl::extractor::build_http_client;
///
/// let client = build_http_client(&ExtractorConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ExtractorConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`StaticFetch`] over a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(client: Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?, config.max_content_bytes))
    }

    async fn fetch_within(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<FetchedDocument, FetchError> {
        let timeout_ms = timeout.as_millis() as u64;

        let mut response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout_ms))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchError::TooLarge {
                    size: declared,
                    max: self.max_bytes,
                });
            }
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_error(e, timeout_ms))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > self.max_bytes {
                return Err(FetchError::TooLarge {
                    size,
                    max: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        trace!(url = %final_url, bytes = body.len(), "Fetched static document");

        Ok(FetchedDocument {
            final_url,
            html: String::from_utf8_lossy(&body).into_owned(),
            status_code: status.as_u16(),
            content_type,
            headers,
        })
    }
}

#[async_trait]
impl StaticFetch for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError> {
        let timeout_ms = timeout.as_millis() as u64;

        match tokio::time::timeout(timeout, self.fetch_within(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { timeout_ms }),
        }
    }
}

/// Maps a reqwest failure to a fetch error kind
fn classify_error(error: reqwest::Error, timeout_ms: u64) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { timeout_ms }
    } else if error.is_redirect() {
        FetchError::Transport(format!("redirect limit exceeded: {}", error))
    } else if error.is_connect() {
        FetchError::Transport(format!("connection failed: {}", error))
    } else {
        FetchError::Transport(error.to_string())
    }
}
