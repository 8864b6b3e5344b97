//! Page extraction
//!
//! The [`Extractor`] picks the cheapest method that yields real content for a
//! URL. It tries a static fetch first, validates the result, and only pays for
//! a rendered fetch when the static result is an error or an empty shell. The
//! winning method is remembered per domain in the [`MethodCache`].

mod convert;
mod fetcher;
mod parser;
mod render;
mod validator;

pub use convert::{html_to_markdown, html_to_text};
pub use fetcher::{build_http_client, FetchedDocument, HttpFetcher, StaticFetch};
pub use parser::{discoverable_links, parse_document, ParsedDocument, NO_TITLE};
pub use render::{
    chrome_capabilities, close_session, RenderOptions, RenderSession, RenderedPage, Renderer,
    WaitHint, WebDriverRenderer, SESSION_CLOSE_TIMEOUT,
};
pub use validator::{
    needs_javascript, validate_content, InvalidReason, ValidationVerdict, MIN_TEXT_LENGTH,
    SPA_TEXT_LENGTH,
};

use crate::cache::MethodCache;
use crate::page::{Method, PageMetadata, PageResult};
use crate::url::extract_domain;
use crate::{FetchError, HiveError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Per-request extraction options
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Budget for each method attempt; the extractor default when unset
    pub timeout: Option<Duration>,
    pub wait: WaitHint,
    pub screenshot: bool,
    pub full_page: bool,
    /// Pins one method: no selection, no cache read or write
    pub force_method: Option<Method>,
}

/// A page and the screenshot taken while rendering it, if any
#[derive(Debug, Clone)]
pub struct Extraction {
    pub page: PageResult,
    /// URL the page was served from after redirects; relative links resolve
    /// against it
    pub final_url: Url,
    pub screenshot: Option<Vec<u8>>,
}

/// Adaptive static/rendered extractor
pub struct Extractor {
    fetcher: Arc<dyn StaticFetch>,
    renderer: Arc<dyn Renderer>,
    cache: Arc<MethodCache>,
    default_timeout: Duration,
}

impl Extractor {
    pub fn new(
        fetcher: Arc<dyn StaticFetch>,
        renderer: Arc<dyn Renderer>,
        cache: Arc<MethodCache>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            cache,
            default_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<MethodCache> {
        &self.cache
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Extracts one page
    ///
    /// Fails with `ExtractionFailed` only once both methods failed. When a
    /// method is forced, that method's own failure is returned instead.
    pub async fn extract(&self, url: &Url, options: &ExtractOptions) -> Result<Extraction> {
        if let Some(method) = options.force_method {
            debug!(url = %url, method = %method, "Extracting with forced method");
            let attempt = match method {
                Method::Static => self
                    .try_static(url, options)
                    .await
                    .map(|(extraction, _)| extraction),
                Method::Rendered => self.try_rendered(url, options).await,
            };
            return attempt.map_err(|e| HiveError::from_fetch(url.as_str(), e));
        }

        let domain = extract_domain(url).unwrap_or_default();

        if self.cache.lookup(&domain) == Some(Method::Rendered) {
            debug!(domain = %domain, "Domain cached as rendered, skipping static fetch");
            let extraction = self
                .try_rendered(url, options)
                .await
                .map_err(|e| extraction_failed(url, e))?;
            self.cache.record(&domain, Method::Rendered);
            info!(url = %url, method = "rendered", "Extracted page");
            return Ok(extraction);
        }

        match self.try_static(url, options).await {
            Ok((extraction, verdict)) if verdict.is_valid => {
                self.cache.record(&domain, Method::Static);
                info!(url = %url, method = "static", "Extracted page");
                return Ok(extraction);
            }
            Ok((extraction, verdict)) => {
                debug!(
                    url = %url,
                    reason = %verdict.reason.map(|r| r.as_str()).unwrap_or_default(),
                    text_length = verdict.text_length,
                    framework_markers = needs_javascript(&extraction.page.raw_html),
                    "Static content rejected, falling back to rendering"
                );
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Static fetch failed, falling back to rendering");
            }
        }

        let extraction = self
            .try_rendered(url, options)
            .await
            .map_err(|e| extraction_failed(url, e))?;
        self.cache.record(&domain, Method::Rendered);
        info!(url = %url, method = "rendered", "Extracted page");

        Ok(extraction)
    }

    fn budget(&self, options: &ExtractOptions) -> Duration {
        options.timeout.unwrap_or(self.default_timeout)
    }

    /// Static attempt, returning the page with its validation verdict
    async fn try_static(
        &self,
        url: &Url,
        options: &ExtractOptions,
    ) -> std::result::Result<(Extraction, ValidationVerdict), FetchError> {
        let started = Instant::now();
        let document = self.fetcher.fetch(url, self.budget(options)).await?;
        let extraction = static_extraction(url, document, started.elapsed());
        let verdict = validate_content(&extraction.page.raw_html, &extraction.page.text_content);
        Ok((extraction, verdict))
    }

    /// Rendered attempt in a fresh session, which is always closed afterwards
    async fn try_rendered(
        &self,
        url: &Url,
        options: &ExtractOptions,
    ) -> std::result::Result<Extraction, FetchError> {
        let budget = self.budget(options);
        let deadline = tokio::time::Instant::now() + budget;

        let mut session = tokio::time::timeout_at(deadline, self.renderer.open_session())
            .await
            .map_err(|_| FetchError::Timeout {
                timeout_ms: budget.as_millis() as u64,
            })??;

        let render_options = RenderOptions {
            timeout: deadline.saturating_duration_since(tokio::time::Instant::now()),
            wait: options.wait.clone(),
            screenshot: options.screenshot,
            full_page: options.full_page,
        };
        let outcome = render_page(session.as_mut(), url, &render_options).await;

        if let Err(e) = close_session(session.as_mut()).await {
            warn!(url = %url, "Failed to close render session: {}", e);
        }

        outcome
    }
}

/// Renders `url` in an existing session under `options.timeout`
///
/// Used directly by crawls that keep one session for many pages.
pub async fn render_page(
    session: &mut dyn RenderSession,
    url: &Url,
    options: &RenderOptions,
) -> std::result::Result<Extraction, FetchError> {
    let started = Instant::now();
    let timeout_ms = options.timeout.as_millis() as u64;

    let rendered = tokio::time::timeout(options.timeout, session.render(url, options))
        .await
        .map_err(|_| FetchError::Timeout { timeout_ms })??;

    Ok(rendered_extraction(url, rendered, started.elapsed()))
}

fn static_extraction(url: &Url, document: FetchedDocument, elapsed: Duration) -> Extraction {
    let parsed = parse_document(&document.html, &document.final_url);

    let page = PageResult {
        url: url.to_string(),
        title: parsed.title,
        text_content: parsed.text_content,
        raw_html: document.html,
        links: parsed.links,
        images: parsed.images,
        metadata: PageMetadata {
            fetch_time_ms: elapsed.as_millis() as u64,
            method: Method::Static,
            status_code: document.status_code,
            content_type: document.content_type,
            timestamp: Utc::now(),
        },
    };

    Extraction {
        page,
        final_url: document.final_url,
        screenshot: None,
    }
}

fn rendered_extraction(url: &Url, rendered: RenderedPage, elapsed: Duration) -> Extraction {
    let page = PageResult {
        url: url.to_string(),
        title: rendered.title,
        text_content: rendered.text,
        raw_html: rendered.html,
        links: rendered.links,
        images: rendered.images,
        metadata: PageMetadata {
            fetch_time_ms: elapsed.as_millis() as u64,
            method: Method::Rendered,
            status_code: 200,
            content_type: "text/html".to_string(),
            timestamp: Utc::now(),
        },
    };

    Extraction {
        page,
        final_url: rendered.final_url,
        screenshot: rendered.screenshot,
    }
}

fn extraction_failed(url: &Url, source: FetchError) -> HiveError {
    HiveError::ExtractionFailed {
        url: url.to_string(),
        source,
    }
}
