//! DuckDuckGo search backend
//!
//! Order of attempts:
//! 1. The HTML frontend, retried with a growing delay
//! 2. The lite frontend, on the last attempt if nothing was found
//! 3. The Instant Answer API, when both frontends came back empty

use crate::config::SearchConfig;
use crate::search::{renumber, SearchHit, SearchMetadata, SearchMethod, SearchResponse, WebSearch};
use crate::{HiveError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const HTML_TIMEOUT: Duration = Duration::from_secs(15);
const LITE_TIMEOUT: Duration = Duration::from_secs(10);
const API_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest `Retry-After` the backend will honor
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// [`WebSearch`] over DuckDuckGo's public frontends
pub struct DuckDuckGo {
    client: Client,
    config: SearchConfig,
}

impl DuckDuckGo {
    pub fn new(client: Client, config: SearchConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(base)
            .and_then(|u| u.join(path))
            .map_err(|e| HiveError::Search(format!("invalid search endpoint '{}': {}", base, e)))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<(StatusCode, HeaderMap, String), reqwest::Error> {
        let response = self.client.get(url.clone()).timeout(timeout).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok((status, headers, body))
    }

    /// Queries the HTML frontend, falling back to the lite frontend on the
    /// last attempt
    async fn search_frontends(
        &self,
        query: &str,
        limit: usize,
        region: &str,
    ) -> Result<Vec<SearchHit>> {
        let params = [("q", query), ("kl", region)];
        let html_url = self.endpoint(&self.config.endpoint, "/html/", &params)?;
        let attempts = self.config.attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = Duration::from_millis(self.config.retry_delay_ms * attempt as u64);
                debug!("Waiting {:?} before search attempt {}", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.get(&html_url, HTML_TIMEOUT).await {
                Ok((StatusCode::OK, _, body)) => {
                    let hits = parse_html_results(&body, limit);
                    debug!(
                        "Search attempt {}/{} found {} results",
                        attempt + 1,
                        attempts,
                        hits.len()
                    );
                    if !hits.is_empty() {
                        return Ok(hits);
                    }
                }
                Ok((StatusCode::TOO_MANY_REQUESTS, headers, _)) => {
                    warn!("Search attempt {}/{} rate limited", attempt + 1, attempts);
                    if let Some(wait) = retry_after(&headers) {
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok((status, _, _)) => {
                    warn!(
                        "Search attempt {}/{} got HTTP {}",
                        attempt + 1,
                        attempts,
                        status.as_u16()
                    );
                }
                Err(e) => {
                    warn!("Search attempt {}/{} failed: {}", attempt + 1, attempts, e);
                }
            }

            if attempt + 1 == attempts {
                let lite_url = self.endpoint(&self.config.endpoint, "/lite/", &params)?;
                match self.get(&lite_url, LITE_TIMEOUT).await {
                    Ok((StatusCode::OK, _, body)) => {
                        let hits = parse_lite_results(&body, limit);
                        debug!("Lite search found {} results", hits.len());
                        return Ok(hits);
                    }
                    Ok((status, _, _)) => warn!("Lite search got HTTP {}", status.as_u16()),
                    Err(e) => warn!("Lite search failed: {}", e),
                }
            }
        }

        Ok(Vec::new())
    }

    async fn search_instant_answer(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = self.endpoint(
            &self.config.api_endpoint,
            "/",
            &[("q", query), ("format", "json"), ("no_html", "1"), ("skip_disambig", "1")],
        )?;

        let (status, _, body) = self
            .get(&url, API_TIMEOUT)
            .await
            .map_err(|e| HiveError::Search(format!("instant answer request failed: {}", e)))?;

        if !status.is_success() {
            return Err(HiveError::Search(format!(
                "instant answer request failed: HTTP {}",
                status.as_u16()
            )));
        }

        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| HiveError::Search(format!("malformed instant answer: {}", e)))?;

        let fallback_url = self.endpoint(&self.config.endpoint, "/", &[("q", query)])?;
        Ok(parse_instant_answer(&answer, fallback_url.as_str(), limit))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search(&self, query: &str, limit: usize, region: &str) -> Result<SearchResponse> {
        let started = Instant::now();

        let mut results = self.search_frontends(query, limit, region).await?;
        let mut method = SearchMethod::Html;

        if results.is_empty() {
            debug!("Frontends returned nothing, trying instant answers");
            results = self.search_instant_answer(query, limit).await?;
            method = SearchMethod::InstantAnswer;
        }

        info!(query = %query, count = results.len(), "Search completed");

        Ok(SearchResponse {
            query: query.to_string(),
            metadata: SearchMetadata {
                count: results.len(),
                fetch_time_ms: started.elapsed().as_millis() as u64,
                region: region.to_string(),
                method,
            },
            results,
        })
    }
}

/// Instant Answer API payload (only the fields used)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InstantAnswer {
    #[serde(rename = "Abstract")]
    pub abstract_text: String,
    #[serde(rename = "Heading")]
    pub heading: String,
    #[serde(rename = "AbstractURL")]
    pub abstract_url: String,
    #[serde(rename = "Results")]
    pub results: Vec<Topic>,
    #[serde(rename = "RelatedTopics")]
    pub related_topics: Vec<Topic>,
}

/// A result or related topic; topic groups deserialize with empty fields
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Topic {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "FirstURL")]
    pub first_url: String,
}

/// Parses result blocks from the HTML frontend
pub fn parse_html_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(url_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse(".result__title a"),
        Selector::parse(".result__url"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for block in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }

        let title_link = block.select(&title_sel).next();
        let title = title_link.map(element_text).unwrap_or_default();
        let href = block
            .select(&url_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .or_else(|| title_link.and_then(|el| el.value().attr("href")))
            .unwrap_or_default();
        let url = unwrap_redirect(href);
        let snippet = block.select(&snippet_sel).next().map(element_text).unwrap_or_default();

        if !title.is_empty() && !url.is_empty() {
            hits.push(SearchHit {
                title,
                url,
                snippet,
                position: 0,
            });
        }
    }

    renumber(&mut hits);
    hits
}

/// Parses the table layout of the lite frontend
pub fn parse_lite_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse("a.result-link"),
        Selector::parse("td.result-snippet"),
    ) else {
        return Vec::new();
    };

    let snippets: Vec<String> = document.select(&snippet_sel).map(element_text).collect();

    let mut hits: Vec<SearchHit> = document
        .select(&link_sel)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            if href.starts_with('/') && !href.starts_with("//") {
                return None;
            }
            Some((element_text(link), unwrap_redirect(href)))
        })
        .filter(|(title, url)| !title.is_empty() && !url.is_empty())
        .enumerate()
        .take(limit)
        .map(|(index, (title, url))| SearchHit {
            title,
            url,
            snippet: snippets.get(index).cloned().unwrap_or_default(),
            position: 0,
        })
        .collect();

    renumber(&mut hits);
    hits
}

/// Flattens an instant answer into hits: the abstract, then direct results,
/// then related topics
pub fn parse_instant_answer(
    answer: &InstantAnswer,
    fallback_url: &str,
    limit: usize,
) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_text.trim().is_empty() {
        hits.push(SearchHit {
            title: non_empty_or(&answer.heading, "Instant Answer"),
            url: non_empty_or(&answer.abstract_url, fallback_url),
            snippet: answer.abstract_text.trim().to_string(),
            position: 0,
        });
    }

    let topics = answer
        .results
        .iter()
        .map(|t| (t, "Search Result"))
        .chain(answer.related_topics.iter().map(|t| (t, "Related Topic")));

    for (topic, default_title) in topics {
        if hits.len() >= limit {
            break;
        }
        if topic.text.is_empty() || topic.first_url.is_empty() {
            continue;
        }

        let text = strip_tags(&topic.text);
        let title = text.split(" - ").next().unwrap_or_default();
        hits.push(SearchHit {
            title: non_empty_or(title, default_title),
            url: topic.first_url.clone(),
            snippet: text.clone(),
            position: 0,
        });
    }

    hits.truncate(limit);
    renumber(&mut hits);
    hits
}

/// Resolves DuckDuckGo's `/l/?uddg=` redirect links to their target
fn unwrap_redirect(href: &str) -> String {
    let href = href.trim();
    if !href.contains("duckduckgo.com/l/?") {
        return href.to_string();
    }

    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|u| u.query_pairs().find(|(k, _)| k == "uddg").map(|(_, v)| v.into_owned()))
        .unwrap_or_else(|| href.to_string())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(text: &str) -> String {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    match TAGS.get_or_init(|| Regex::new(r"<[^>]*>").ok()) {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
