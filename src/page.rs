//! Extracted page types shared by the extractor, crawler and API layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extraction method used to obtain a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Plain HTTP GET, no script execution
    #[serde(alias = "cheerio")]
    Static,
    /// DOM read back from a JavaScript-executing browser
    #[serde(alias = "playwright")]
    Rendered,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Rendered => "rendered",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" | "cheerio" => Ok(Self::Static),
            "rendered" | "playwright" | "browser" => Ok(Self::Rendered),
            other => Err(format!(
                "unknown method '{}', expected 'static' or 'rendered'",
                other
            )),
        }
    }
}

/// An anchor found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRef {
    pub text: String,
    pub href: String,
    pub absolute_href: String,
}

/// An image found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
    pub absolute_src: String,
}

/// How and when a page was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub fetch_time_ms: u64,
    pub method: Method,
    pub status_code: u16,
    pub content_type: String,
    pub timestamp: DateTime<Utc>,
}

/// The result of extracting one page
///
/// Produced once per successfully extracted page and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub title: String,
    pub text_content: String,
    pub raw_html: String,
    pub links: Vec<LinkRef>,
    pub images: Vec<ImageRef>,
    pub metadata: PageMetadata,
}
