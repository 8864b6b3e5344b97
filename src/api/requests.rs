//! Request and response bodies of the boundary operations

use crate::crawler::{CrawlReport, PageFailure};
use crate::extractor::{html_to_markdown, ExtractOptions, Extraction, WaitHint};
use crate::page::{ImageRef, LinkRef, Method, PageMetadata};
use crate::HiveError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Output format of a scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Json,
    Text,
}

impl FromStr for OutputFormat {
    type Err = HiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(HiveError::UnsupportedFormat(
                "Format must be one of: markdown, html, json, text".to_string(),
            )),
        }
    }
}

/// A wait hint: a CSS selector or a number of milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WaitFor {
    Millis(u64),
    Selector(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapeRequestOptions {
    #[serde(alias = "timeout")]
    pub timeout_ms: Option<u64>,
    pub wait_for: Option<WaitFor>,
    pub screenshot: bool,
    /// Defaults to true
    pub full_page: Option<bool>,
    pub force_method: Option<Method>,
}

impl ScrapeRequestOptions {
    pub fn to_extract_options(&self) -> ExtractOptions {
        let wait = match &self.wait_for {
            Some(WaitFor::Selector(selector)) => WaitHint::Selector(selector.clone()),
            Some(WaitFor::Millis(ms)) => WaitHint::Millis(*ms),
            None => WaitHint::Load,
        };

        ExtractOptions {
            timeout: self.timeout_ms.map(Duration::from_millis),
            wait,
            screenshot: self.screenshot,
            full_page: self.full_page.unwrap_or(true),
            force_method: self.force_method,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapeRequest {
    pub url: Option<String>,
    pub format: Option<String>,
    pub options: ScrapeRequestOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResponse {
    pub url: String,
    pub title: String,
    pub metadata: PageMetadata,
    pub links: Vec<LinkRef>,
    pub images: Vec<ImageRef>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Base64-encoded PNG
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl ScrapeResponse {
    pub fn build(extraction: Extraction, format: OutputFormat) -> Self {
        let page = extraction.page;

        let (markdown, html) = match format {
            OutputFormat::Markdown => (Some(html_to_markdown(&page.raw_html)), None),
            OutputFormat::Html => (None, Some(page.raw_html)),
            OutputFormat::Json => (Some(html_to_markdown(&page.raw_html)), Some(page.raw_html)),
            OutputFormat::Text => (None, None),
        };

        Self {
            url: page.url,
            title: page.title,
            metadata: page.metadata,
            links: page.links,
            images: page.images,
            content: page.text_content,
            markdown,
            html,
            screenshot: extraction.screenshot.map(|png| STANDARD.encode(png)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternSet {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlRequest {
    pub url: Option<String>,
    pub max_pages: Option<u32>,
    pub max_depth: Option<u32>,
    pub same_origin: Option<bool>,
    pub patterns: PatternSet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPageView {
    pub url: String,
    pub title: String,
    pub content: String,
    pub markdown: String,
    pub depth: u32,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlMetadata {
    pub total_pages: usize,
    pub failed_pages: usize,
    pub total_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlResponse {
    pub pages: Vec<CrawlPageView>,
    pub failures: Vec<PageFailure>,
    pub metadata: CrawlMetadata,
}

impl From<CrawlReport> for CrawlResponse {
    fn from(report: CrawlReport) -> Self {
        let metadata = CrawlMetadata {
            total_pages: report.pages.len(),
            failed_pages: report.failures.len(),
            total_time_ms: report.elapsed_ms,
            started_at: report.started_at,
            completed_at: report.completed_at,
        };

        let pages = report
            .pages
            .into_iter()
            .map(|crawled| CrawlPageView {
                markdown: html_to_markdown(&crawled.page.raw_html),
                url: crawled.page.url,
                title: crawled.page.title,
                content: crawled.page.text_content,
                depth: crawled.depth,
                metadata: crawled.page.metadata,
            })
            .collect();

        Self {
            pages,
            failures: report.failures,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub region: Option<String>,
}
