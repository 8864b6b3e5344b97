//! HTML parser for extracting page content
//!
//! This module turns an HTML document into the fields of a page result:
//! - Title (`<title>`, falling back to the first `<h1>`)
//! - Main text content, with script/style/noscript text removed
//! - Every anchor and image, with absolute URLs
//!
//! It also enumerates the links a crawl may follow.

use crate::page::{ImageRef, LinkRef};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Title used when a document has neither `<title>` nor `<h1>`
pub const NO_TITLE: &str = "No title";

/// Main-content containers, tried in order
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    r#"[role="main"]"#,
    ".content",
    "#content",
    ".main-content",
    "#main-content",
    ".post-content",
    ".entry-content",
];

/// Elements whose text never counts as page content
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript"];

/// Content extracted from an HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: String,
    pub text_content: String,
    pub links: Vec<LinkRef>,
    pub images: Vec<ImageRef>,
}

/// Parses HTML content and extracts title, text, links and images
///
/// # Example
///
/// ```
/// use hivecrawl::extractor::parse_document;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><main><p>Hello</p></main><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_document(html, &base_url);
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.text_content, "Hello");
/// assert_eq!(parsed.links[0].absolute_href, "https://example.com/page");
/// ```
pub fn parse_document(html: &str, base_url: &Url) -> ParsedDocument {
    let document = Html::parse_document(html);

    ParsedDocument {
        title: extract_title(&document),
        text_content: extract_text(&document),
        links: extract_links(&document, base_url),
        images: extract_images(&document, base_url),
    }
}

/// Enumerates the links a crawl may follow from this document
///
/// **Include:** `<a href>` resolving to an `http`/`https` URL
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links (same page anchors)
///
/// Links are returned in document order, with fragments removed.
pub fn discoverable_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(url) = resolve_link(href, base_url) {
                    links.push(url);
                }
            }
        }
    }

    links
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn extract_title(document: &Html) -> String {
    let title = first_match(document, "title")
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    title
        .or_else(|| {
            first_match(document, "h1")
                .map(|el| collapse_whitespace(&visible_text(el)))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| NO_TITLE.to_string())
}

/// Text of the first main-content container, or of `<body>` when there is
/// none or it is empty
fn extract_text(document: &Html) -> String {
    let main = CONTENT_SELECTORS
        .iter()
        .find_map(|selector| first_match(document, selector))
        .map(|el| collapse_whitespace(&visible_text(el)))
        .unwrap_or_default();

    if !main.is_empty() {
        return main;
    }

    first_match(document, "body")
        .map(|el| collapse_whitespace(&visible_text(el)))
        .unwrap_or_default()
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<LinkRef> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            if href.trim().is_empty() {
                return None;
            }
            Some(LinkRef {
                text: collapse_whitespace(&visible_text(el)),
                href: href.to_string(),
                absolute_href: make_absolute(href, base_url),
            })
        })
        .collect()
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageRef> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            if src.trim().is_empty() {
                return None;
            }
            Some(ImageRef {
                src: src.to_string(),
                alt: el.value().attr("alt").unwrap_or_default().to_string(),
                absolute_src: make_absolute(src, base_url),
            })
        })
        .collect()
}

/// Concatenated text of `element`, skipping hidden subtrees
fn visible_text(element: ElementRef<'_>) -> String {
    collect_text(element, HIDDEN_TAGS, "")
}

/// Joins the text nodes under `element` with `separator`, skipping any text
/// inside an element named in `hidden`
pub(crate) fn collect_text(element: ElementRef<'_>, hidden: &[&str], separator: &str) -> String {
    let mut fragments: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };

        let is_hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| hidden.contains(&el.name()))
        });

        if !is_hidden {
            fragments.push(fragment);
        }
    }

    fragments.join(separator)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves `href` against the base, falling back to the raw value
fn make_absolute(href: &str, base_url: &Url) -> String {
    base_url
        .join(href.trim())
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolves a link href to a followable absolute URL
///
/// Returns None for special schemes, fragment-only links, unparseable values
/// and anything that is not HTTP(S) after resolution.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
