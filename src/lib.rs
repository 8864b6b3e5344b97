//! HiveCrawl: adaptive web extraction and crawl orchestration
//!
//! This crate extracts cleaned text, links and images from web pages on demand.
//! Each page is fetched with the cheapest method that yields real content: a
//! static HTTP fetch first, a rendered (JavaScript-executing) fetch only when the
//! static result is an empty shell. The winning method is remembered per domain.
//! On top of single-page extraction it offers bounded breadth-first crawling and
//! per-client admission control.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod crawler;
pub mod extractor;
pub mod limiter;
pub mod page;
pub mod search;
pub mod url;

use serde_json::{json, Value};
use thiserror::Error;

/// Main error type for HiveCrawl operations
#[derive(Debug, Error)]
pub enum HiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    MissingParameter(String),

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    RateLimitExceeded(String),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Content size {size} bytes exceeds maximum {max} bytes")]
    ContentTooLarge { url: String, size: u64, max: u64 },

    #[error("Failed to scrape URL: {url} - {source}")]
    Fetch { url: String, source: FetchError },

    #[error("Failed to scrape URL: {url} - all methods failed, last error: {source}")]
    ExtractionFailed { url: String, source: FetchError },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HiveError {
    /// Builds an `InvalidUrl` error from a URL-module failure
    pub fn invalid_url(url: &str, error: UrlError) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }

    /// Lifts a method-local fetch failure to a caller-facing error
    ///
    /// Used when a single method was pinned by the caller, so the specific
    /// failure kind is surfaced instead of being absorbed by the fallback.
    pub fn from_fetch(url: &str, error: FetchError) -> Self {
        match error {
            FetchError::Timeout { timeout_ms } => Self::Timeout {
                url: url.to_string(),
                timeout_ms,
            },
            FetchError::TooLarge { size, max } => Self::ContentTooLarge {
                url: url.to_string(),
                size,
                max,
            },
            other => Self::Fetch {
                url: url.to_string(),
                source: other,
            },
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::InvalidUrl { .. } => "INVALID_URL",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::RateLimitExceeded(_) => "RATE_LIMITED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ContentTooLarge { .. } => "CONTENT_TOO_LARGE",
            Self::Fetch { .. } | Self::ExtractionFailed { .. } => "SCRAPE_FAILED",
            Self::Search(_) => "SEARCH_FAILED",
            Self::Io(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the boundary layer reports for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidUrl { .. }
            | Self::InvalidParameter(_)
            | Self::UnsupportedFormat(_) => 400,
            Self::RateLimitExceeded(_) => 429,
            Self::ContentTooLarge { .. } => 413,
            Self::Timeout { .. } => 504,
            _ => 500,
        }
    }

    /// Structured error details, if the error carries any
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidUrl { url, reason } => Some(json!({ "url": url, "reason": reason })),
            Self::Timeout { url, timeout_ms } => Some(json!({ "url": url, "timeout": timeout_ms })),
            Self::ContentTooLarge { size, max, .. } => {
                Some(json!({ "size": size, "maxSize": max }))
            }
            Self::Fetch { url, source } | Self::ExtractionFailed { url, source } => {
                Some(json!({ "url": url, "reason": source.to_string() }))
            }
            _ => None,
        }
    }

    /// Returns true if the request was rejected before any network activity
    pub fn is_input_error(&self) -> bool {
        self.http_status() == 400
    }
}

/// Failure of a single extraction method (static or rendered)
///
/// These never reach the caller directly on the adaptive path: the extractor
/// dispatches on the kind and falls back to the other method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("content size {size} bytes exceeds maximum {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("renderer has been shut down")]
    SessionClosed,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Invalid URL format: {0}")]
    Parse(String),

    #[error("Only HTTP/HTTPS URLs are supported, got: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Access to this domain is not allowed")]
    Blocked(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

/// Result type alias for HiveCrawl operations
pub type Result<T> = std::result::Result<T, HiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use api::{ApiResponse, Engine};
pub use cache::MethodCache;
pub use config::Config;
pub use crawler::{CrawlOptions, CrawlReport, Crawler};
pub use extractor::{validate_content, ExtractOptions, Extractor, ValidationVerdict};
pub use limiter::RateLimiter;
pub use page::{Method, PageResult};
pub use crate::url::{extract_domain, normalize_url, validate_url};
