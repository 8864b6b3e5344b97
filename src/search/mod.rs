//! Web search collaborator
//!
//! Search is best effort: the backend retries and falls back internally, and
//! the engine treats it as a black box returning ordered hits.

mod duckduckgo;

pub use duckduckgo::{parse_html_results, parse_instant_answer, parse_lite_results, DuckDuckGo};

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based rank within the response
    pub position: usize,
}

/// Which backend produced the hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchMethod {
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "instant-answer")]
    InstantAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub count: usize,
    pub fetch_time_ms: u64,
    pub region: String,
    pub method: SearchMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub metadata: SearchMetadata,
}

/// A web search backend
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Returns at most `limit` hits for `query`, best first
    async fn search(&self, query: &str, limit: usize, region: &str) -> Result<SearchResponse>;
}

/// Renumbers hits from 1 after truncation or merging
pub(crate) fn renumber(hits: &mut [SearchHit]) {
    for (index, hit) in hits.iter_mut().enumerate() {
        hit.position = index + 1;
    }
}
