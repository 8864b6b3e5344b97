//! HTML to plain text and Markdown conversion

use crate::extractor::parser::{collapse_whitespace, collect_text};
use htmd::HtmlToMarkdown;
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;
use tracing::warn;

/// Elements dropped entirely by both conversions
const STRIPPED_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "object", "embed"];

/// Extracts clean text from HTML, without any formatting
///
/// # Example
///
/// ```
/// use hivecrawl::extractor::html_to_text;
///
/// let text = html_to_text("<p>Hello</p><script>track()</script><p>world</p>");
/// assert_eq!(text, "Hello world");
/// ```
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = collect_text(document.root_element(), STRIPPED_TAGS, " ");
    collapse_whitespace(&text)
}

/// Converts HTML to Markdown
///
/// Falls back to plain text if the converter rejects the document.
pub fn html_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(STRIPPED_TAGS.to_vec())
        .build();

    match converter.convert(html) {
        Ok(markdown) => collapse_blank_lines(&markdown),
        Err(e) => {
            warn!("Markdown conversion failed, using plain text: {}", e);
            html_to_text(html)
        }
    }
}

/// Collapses runs of three or more newlines to a single blank line
fn collapse_blank_lines(markdown: &str) -> String {
    static BLANK_RUNS: OnceLock<Option<Regex>> = OnceLock::new();

    let collapsed = match BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").ok()) {
        Some(re) => re.replace_all(markdown, "\n\n").into_owned(),
        None => markdown.to_string(),
    };

    collapsed.trim().to_string()
}
