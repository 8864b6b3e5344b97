//! Boundary surface
//!
//! [`Engine`] owns one instance of every stateful component and exposes the
//! three client operations (scrape, crawl, search) plus administrative
//! controls. Every client operation runs under the per-client rate limiter and
//! reports failures through the [`ApiResponse`] envelope's stable codes.

mod requests;
mod response;

pub use requests::{
    CrawlMetadata, CrawlPageView, CrawlRequest, CrawlResponse, OutputFormat, PatternSet,
    ScrapeRequest, ScrapeRequestOptions, ScrapeResponse, SearchRequest, WaitFor,
};
pub use response::{ApiError, ApiResponse};

use crate::cache::{CacheStats, MethodCache};
use crate::config::Config;
use crate::crawler::{CrawlOptions, Crawler};
use crate::extractor::{
    build_http_client, Extractor, HttpFetcher, Renderer, StaticFetch, WebDriverRenderer,
};
use crate::limiter::{LimiterInfo, RateLimiter};
use crate::search::{DuckDuckGo, SearchResponse, WebSearch};
use crate::url::validate_url;
use crate::{HiveError, Result};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

/// The extraction engine and its shared state
pub struct Engine {
    config: Config,
    limiter: RateLimiter,
    cache: Arc<MethodCache>,
    extractor: Arc<Extractor>,
    crawler: Crawler,
    search: Arc<dyn WebSearch>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Builds an engine with the HTTP fetcher, WebDriver renderer and
    /// DuckDuckGo search described by `config`
    ///
    /// When called inside a tokio runtime the method cache sweeper is started.
    pub fn new(config: Config) -> Result<Self> {
        let client = build_http_client(&config.extractor)
            .map_err(|e| HiveError::Internal(format!("failed to build HTTP client: {}", e)))?;

        let fetcher = Arc::new(HttpFetcher::new(
            client.clone(),
            config.extractor.max_content_bytes,
        ));
        let renderer = Arc::new(WebDriverRenderer::new(
            config.renderer.clone(),
            config.extractor.user_agent.clone(),
        ));
        let search = Arc::new(DuckDuckGo::new(client, config.search.clone()));

        Ok(Self::with_components(config, fetcher, renderer, search))
    }

    /// Builds an engine around the given collaborators
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn StaticFetch>,
        renderer: Arc<dyn Renderer>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        let cache = Arc::new(MethodCache::from_config(&config.cache));
        let extractor = Arc::new(Extractor::new(
            fetcher,
            renderer,
            cache.clone(),
            config.extractor.timeout(),
        ));

        let sweeper = tokio::runtime::Handle::try_current()
            .ok()
            .map(|_| cache.spawn_sweeper(config.cache.sweep_interval()));

        Self {
            limiter: RateLimiter::from_config(&config.limiter),
            crawler: Crawler::new(extractor.clone()),
            cache,
            extractor,
            search,
            sweeper: Mutex::new(sweeper),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<MethodCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn extractor(&self) -> &Arc<Extractor> {
        &self.extractor
    }

    /// Extracts a single page for `client`
    pub async fn scrape(&self, client: &str, request: ScrapeRequest) -> Result<ScrapeResponse> {
        self.limiter.run(client, self.scrape_admitted(request)).await?
    }

    /// Crawls a site for `client`
    pub async fn crawl(&self, client: &str, request: CrawlRequest) -> Result<CrawlResponse> {
        self.limiter.run(client, self.crawl_admitted(request)).await?
    }

    /// Runs a web search for `client`
    pub async fn search(&self, client: &str, request: SearchRequest) -> Result<SearchResponse> {
        self.limiter.run(client, self.search_admitted(request)).await?
    }

    async fn scrape_admitted(&self, request: ScrapeRequest) -> Result<ScrapeResponse> {
        let url = self.target_url(request.url.as_deref())?;
        let format = match request.format.as_deref() {
            Some(format) => format.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        };

        let extraction = self
            .extractor
            .extract(&url, &request.options.to_extract_options())
            .await?;

        Ok(ScrapeResponse::build(extraction, format))
    }

    async fn crawl_admitted(&self, request: CrawlRequest) -> Result<CrawlResponse> {
        let url = self.target_url(request.url.as_deref())?;

        let mut options = CrawlOptions::from_config(&self.config.crawl, &self.config.extractor);
        if let Some(max_pages) = request.max_pages {
            options.max_pages = max_pages;
        }
        if let Some(max_depth) = request.max_depth {
            options.max_depth = max_depth;
        }
        if let Some(same_origin) = request.same_origin {
            options.same_origin = same_origin;
        }
        options.include_patterns = request.patterns.include;
        options.exclude_patterns = request.patterns.exclude;

        let report = self.crawler.crawl(&url, &options).await?;
        Ok(CrawlResponse::from(report))
    }

    async fn search_admitted(&self, request: SearchRequest) -> Result<SearchResponse> {
        let query = request
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                HiveError::MissingParameter("Query parameter \"q\" is required".to_string())
            })?;

        let max_limit = self.config.search.max_limit;
        let limit = request.limit.unwrap_or(self.config.search.default_limit);
        if limit < 1 || limit > max_limit {
            return Err(HiveError::InvalidParameter(format!(
                "Limit must be between 1 and {}",
                max_limit
            )));
        }

        let region = request
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.config.search.region);

        self.search.search(query, limit, region).await
    }

    /// Validates a client-supplied target URL
    fn target_url(&self, raw: Option<&str>) -> Result<Url> {
        let raw = raw
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| HiveError::MissingParameter("URL is required".to_string()))?;

        validate_url(raw, self.config.security.allow_private_hosts)
            .map_err(|e| HiveError::invalid_url(raw, e))
    }

    /// Fails `client`'s waiting requests and forgets its limiter state
    pub fn reset_client(&self, client: &str) -> bool {
        self.limiter.reset(client)
    }

    pub async fn limiter_info(&self, client: &str) -> LimiterInfo {
        self.limiter.info(client).await
    }

    /// Forgets the remembered method for `domain`
    pub fn invalidate_domain(&self, domain: &str) -> bool {
        self.cache.invalidate(&domain.to_lowercase())
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stops the cache sweeper and shuts the renderer down
    pub async fn shutdown(&self) -> Result<()> {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = sweeper {
            handle.abort();
            debug!("Stopped method cache sweeper");
        }

        self.extractor
            .renderer()
            .shutdown()
            .await
            .map_err(|e| HiveError::Internal(format!("renderer shutdown failed: {}", e)))?;

        info!("Engine shut down");
        Ok(())
    }
}
