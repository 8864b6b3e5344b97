//! Crawl frontier: link admission and per-crawl state

use crate::crawler::CrawlOptions;
use crate::url::{extract_domain, matches_any, normalize_url, same_site, GlobPattern};
use crate::{HiveError, Result};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: Url,
    pub depth: u32,
}

/// Decides whether a discovered link may join the frontier
///
/// A pure predicate over `(candidate, current_depth)`: it holds the start
/// domain and compiled patterns but never changes after construction.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    start_domain: String,
    max_depth: u32,
    same_origin: bool,
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
}

impl LinkFilter {
    /// Builds the filter for a crawl seeded at `start_url`
    ///
    /// # Returns
    ///
    /// * `Ok(LinkFilter)` - Patterns compiled
    /// * `Err(HiveError::InvalidUrl)` - The start URL has no host
    /// * `Err(HiveError::InvalidParameter)` - A pattern failed to compile
    pub fn new(start_url: &Url, options: &CrawlOptions) -> Result<Self> {
        let start_domain = extract_domain(start_url).ok_or_else(|| HiveError::InvalidUrl {
            url: start_url.to_string(),
            reason: "Missing domain in URL".to_string(),
        })?;

        let compile = |patterns: &[String]| {
            GlobPattern::compile_all(patterns)
                .map_err(|e| HiveError::InvalidParameter(e.to_string()))
        };

        Ok(Self {
            start_domain,
            max_depth: options.max_depth,
            same_origin: options.same_origin,
            include: compile(&options.include_patterns)?,
            exclude: compile(&options.exclude_patterns)?,
        })
    }

    pub fn start_domain(&self) -> &str {
        &self.start_domain
    }

    /// Returns true if links found on a page at `current_depth` may be followed
    pub fn can_descend(&self, current_depth: u32) -> bool {
        current_depth < self.max_depth
    }

    /// Returns true if `candidate`, found on a page at `current_depth`, may be
    /// enqueued
    ///
    /// Checked in order: depth, origin, include patterns (when any), exclude
    /// patterns.
    pub fn allows(&self, candidate: &Url, current_depth: u32) -> bool {
        if !self.can_descend(current_depth) {
            return false;
        }

        if self.same_origin && !same_site(&self.start_domain, candidate) {
            return false;
        }

        let candidate = candidate.as_str();

        if !self.include.is_empty() && !matches_any(&self.include, candidate) {
            return false;
        }

        !matches_any(&self.exclude, candidate)
    }
}

/// State of one crawl invocation
///
/// URLs are marked visited when they are enqueued, so a URL enters the
/// frontier at most once and is never fetched twice.
#[derive(Debug)]
pub struct CrawlState {
    visited: HashSet<String>,
    frontier: VecDeque<QueuedUrl>,
    max_pages: usize,
    collected: usize,
}

impl CrawlState {
    /// Creates the state with `seed` queued at depth 0
    pub fn new(seed: Url, max_pages: usize) -> Self {
        let mut state = Self {
            visited: HashSet::new(),
            frontier: VecDeque::new(),
            max_pages,
            collected: 0,
        };
        state.push(seed, 0);
        state
    }

    /// Dequeues the earliest-enqueued URL, or None once the frontier is empty
    /// or the page cap is reached
    pub fn next(&mut self) -> Option<QueuedUrl> {
        if self.is_full() {
            return None;
        }
        self.frontier.pop_front()
    }

    /// Counts one collected page
    pub fn record_page(&mut self) {
        self.collected += 1;
    }

    /// True once `max_pages` pages were collected
    pub fn is_full(&self) -> bool {
        self.collected >= self.max_pages
    }

    /// Enqueues a URL unless it was seen before or the cap is reached
    ///
    /// Returns true if the URL was added.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        if self.is_full() {
            return false;
        }
        self.push(url, depth)
    }

    fn push(&mut self, url: Url, depth: u32) -> bool {
        let key = dedup_key(&url);
        if !self.visited.insert(key) {
            return false;
        }
        self.frontier.push_back(QueuedUrl { url, depth });
        true
    }

    pub fn collected(&self) -> usize {
        self.collected
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

fn dedup_key(url: &Url) -> String {
    normalize_url(url.as_str())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}
