//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Validating limits and compiling link patterns
//! - Draining the frontier in discovery order
//! - Fetching each page (one render session, or the adaptive extractor)
//! - Admitting discovered links through the link filter

use crate::config::FetchMode;
use crate::crawler::frontier::{CrawlState, LinkFilter, QueuedUrl};
use crate::crawler::{CrawlOptions, CrawlReport, CrawledPage, PageFailure};
use crate::extractor::{
    close_session, discoverable_links, render_page, ExtractOptions, Extraction, Extractor,
    RenderOptions, RenderSession, WaitHint,
};
use crate::{HiveError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Runs bounded breadth-first crawls
pub struct Crawler {
    extractor: Arc<Extractor>,
}

impl Crawler {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }

    /// Crawls from `start_url`
    ///
    /// Pages come back in the order they were dequeued. A page that fails is
    /// recorded in the report's failures and the crawl moves on.
    ///
    /// # Arguments
    ///
    /// * `start_url` - The seed URL (depth 0)
    /// * `options` - Limits, origin policy, patterns and fetch mode
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl ran to completion
    /// * `Err(HiveError::InvalidParameter)` - Limits out of range or a bad pattern
    /// * `Err(HiveError::ExtractionFailed)` - No render session could be opened
    pub async fn crawl(&self, start_url: &Url, options: &CrawlOptions) -> Result<CrawlReport> {
        options.validate()?;
        let filter = LinkFilter::new(start_url, options)?;

        let started_at = Utc::now();
        let start_time = Instant::now();

        tracing::info!(
            "Starting crawl of {} (max {} pages, depth {}, {:?} mode)",
            start_url,
            options.max_pages,
            options.max_depth,
            options.fetch_mode
        );

        let mut session = match options.fetch_mode {
            FetchMode::Rendered => Some(self.open_session(start_url, options).await?),
            FetchMode::Adaptive => None,
        };

        let mut state = CrawlState::new(start_url.clone(), options.max_pages as usize);
        let mut pages = Vec::new();
        let mut failures = Vec::new();

        while let Some(QueuedUrl { url, depth }) = state.next() {
            let first = pages.is_empty() && failures.is_empty();
            if !first && !options.page_delay.is_zero() {
                tokio::time::sleep(options.page_delay).await;
            }

            tracing::debug!("Processing URL: {} (depth {})", url, depth);

            let outcome = match session.as_mut() {
                Some(session) => self.render(session.as_mut(), &url, options).await,
                None => self.extract(&url, options).await,
            };

            match outcome {
                Ok(extraction) => {
                    state.record_page();

                    if filter.can_descend(depth) {
                        let links =
                            discoverable_links(&extraction.page.raw_html, &extraction.final_url);
                        for link in links {
                            if state.is_full() {
                                break;
                            }
                            if filter.allows(&link, depth) {
                                state.enqueue(link, depth + 1);
                            }
                        }
                    }

                    pages.push(CrawledPage {
                        depth,
                        page: extraction.page,
                    });
                }
                Err(e) => {
                    tracing::warn!("Failed to crawl {}: {}", url, e);
                    failures.push(PageFailure {
                        url: url.to_string(),
                        depth,
                        code: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(mut session) = session {
            if let Err(e) = close_session(session.as_mut()).await {
                tracing::warn!("Failed to close crawl render session: {}", e);
            }
        }

        let elapsed = start_time.elapsed();
        tracing::info!(
            "Crawl completed: {} pages collected, {} failed in {:?}",
            pages.len(),
            failures.len(),
            elapsed
        );

        Ok(CrawlReport {
            pages,
            failures,
            started_at,
            completed_at: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    async fn open_session(
        &self,
        start_url: &Url,
        options: &CrawlOptions,
    ) -> Result<Box<dyn RenderSession>> {
        let failed = |source| HiveError::ExtractionFailed {
            url: start_url.to_string(),
            source,
        };

        let opening = self.extractor.renderer().open_session();
        match tokio::time::timeout(options.page_timeout, opening).await {
            Ok(session) => session.map_err(failed),
            Err(_) => Err(failed(crate::FetchError::Timeout {
                timeout_ms: options.page_timeout.as_millis() as u64,
            })),
        }
    }

    async fn render(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
        options: &CrawlOptions,
    ) -> Result<Extraction> {
        let render_options = RenderOptions {
            timeout: options.page_timeout,
            wait: WaitHint::Load,
            screenshot: false,
            full_page: false,
        };

        render_page(session, url, &render_options)
            .await
            .map_err(|e| HiveError::from_fetch(url.as_str(), e))
    }

    async fn extract(&self, url: &Url, options: &CrawlOptions) -> Result<Extraction> {
        let extract_options = ExtractOptions {
            timeout: Some(options.page_timeout),
            ..ExtractOptions::default()
        };
        self.extractor.extract(url, &extract_options).await
    }
}
