//! Crawler module for bounded breadth-first crawls
//!
//! This module contains the crawl logic, including:
//! - Crawl options and their validation
//! - The frontier: link admission and per-crawl dedup state
//! - Crawl coordination over the extractor or a single render session

mod coordinator;
mod frontier;

pub use coordinator::Crawler;
pub use frontier::{CrawlState, LinkFilter, QueuedUrl};

use crate::config::{CrawlConfig, ExtractorConfig, FetchMode};
use crate::page::PageResult;
use crate::{HiveError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Upper bound on `max_pages`
pub const MAX_PAGES_LIMIT: u32 = 100;

/// Upper bound on `max_depth`
pub const MAX_DEPTH_LIMIT: u32 = 5;

/// Options for one crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_pages: u32,
    pub max_depth: u32,
    /// Only follow links on the seed's site
    pub same_origin: bool,
    /// Glob patterns a link must match one of (ignored when empty)
    pub include_patterns: Vec<String>,
    /// Glob patterns a link must match none of
    pub exclude_patterns: Vec<String>,
    pub page_timeout: Duration,
    /// Pause between consecutive page fetches
    pub page_delay: Duration,
    pub fetch_mode: FetchMode,
}

impl CrawlOptions {
    /// Builds crawl options from configured defaults
    pub fn from_config(crawl: &CrawlConfig, extractor: &ExtractorConfig) -> Self {
        Self {
            max_pages: crawl.default_max_pages,
            max_depth: crawl.default_max_depth,
            same_origin: crawl.same_origin,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            page_timeout: extractor.timeout(),
            page_delay: Duration::from_millis(crawl.page_delay_ms),
            fetch_mode: crawl.fetch_mode,
        }
    }

    /// Rejects out-of-range limits before any network activity
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGES_LIMIT).contains(&self.max_pages) {
            return Err(HiveError::InvalidParameter(format!(
                "maxPages must be between 1 and {}",
                MAX_PAGES_LIMIT
            )));
        }

        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(HiveError::InvalidParameter(format!(
                "maxDepth must be between 1 and {}",
                MAX_DEPTH_LIMIT
            )));
        }

        Ok(())
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from_config(&CrawlConfig::default(), &ExtractorConfig::default())
    }
}

/// A collected page and the depth it was found at
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawledPage {
    pub depth: u32,
    pub page: PageResult,
}

/// A page that failed during a crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFailure {
    pub url: String,
    pub depth: u32,
    pub code: String,
    pub message: String,
}

/// Outcome of a crawl
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    /// Collected pages in the order they were fetched
    pub pages: Vec<CrawledPage>,
    pub failures: Vec<PageFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl CrawlReport {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
