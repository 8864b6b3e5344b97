//! URL handling module for HiveCrawl
//!
//! This module provides inbound URL validation, domain extraction, URL
//! normalization for crawl deduplication, and glob-style URL patterns.

mod domain;
mod matcher;
mod normalize;

use crate::{UrlError, UrlResult};
use ::url::Url;

// Re-export main functions
pub use domain::{extract_domain, registrable_domain, same_site};
pub use matcher::{matches_any, GlobPattern};
pub use normalize::normalize_url;

/// Hosts and host prefixes that inbound requests may never target
///
/// Entries ending in `.` are prefixes (private address ranges); the rest must
/// match the whole host or be a prefix of it.
const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "169.254.169.254",
    "metadata.google.internal",
    "169.254.",
    "10.",
    "172.16.",
    "192.168.",
];

/// Validates that a URL is safe to fetch on behalf of a client
///
/// # Rules
///
/// 1. Must parse as an absolute URL
/// 2. Scheme must be `http` or `https`
/// 3. Unless `allow_private` is set, loopback, link-local, cloud metadata and
///    private-network hosts are rejected
///
/// # Examples
///
/// ```
/// use hivecrawl::url::validate_url;
///
/// assert!(validate_url("https://example.com/page", false).is_ok());
/// assert!(validate_url("ftp://example.com/file", false).is_err());
/// assert!(validate_url("http://127.0.0.1:8080/", false).is_err());
/// assert!(validate_url("http://127.0.0.1:8080/", true).is_ok());
/// ```
pub fn validate_url(raw: &str, allow_private: bool) -> UrlResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = extract_domain(&url).ok_or(UrlError::MissingDomain)?;

    if !allow_private && is_blocked_host(&host) {
        return Err(UrlError::Blocked(host));
    }

    Ok(url)
}

/// Checks a lowercase host against the blocked host list
fn is_blocked_host(host: &str) -> bool {
    BLOCKED_HOSTS
        .iter()
        .any(|blocked| host == *blocked || host.starts_with(blocked))
}
