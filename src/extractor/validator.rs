//! Content validation
//!
//! Decides whether a statically fetched document is real content or an empty
//! shell that only fills in after scripts run.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Minimum trimmed text length of a real page
pub const MIN_TEXT_LENGTH: usize = 100;

/// Below this length an empty SPA mount marker marks the page as unrendered
pub const SPA_TEXT_LENGTH: usize = 500;

/// Closing tags a document needs before it counts as structured
const MIN_CLOSING_TAGS: usize = 5;

const JS_WARNINGS: &[&str] = &[
    "javascript is disabled",
    "enable javascript",
    "javascript is required",
    "please enable javascript",
    "you need to enable javascript",
];

const EMPTY_MOUNT_MARKERS: &[&str] = &[
    r#"<div id="root"></div>"#,
    r#"<div id="app"></div>"#,
    r#"<div id="__next"></div>"#,
];

const FRAMEWORK_MARKERS: &[&str] = &[
    "data-react-root",
    "data-reactroot",
    "ng-app",
    "data-ng-app",
    "v-app",
    "__NEXT_DATA__",
    "__nuxt",
    "data-server-rendered",
];

/// Why a document was judged not to be real content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    TooShort,
    NoStructure,
    JsWarning,
    UnrenderedSpa,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort => "too short",
            Self::NoStructure => "no structure",
            Self::JsWarning => "JS warning detected",
            Self::UnrenderedSpa => "unrendered SPA",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`validate_content`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub reason: Option<InvalidReason>,
    pub text_length: usize,
    pub has_structure: bool,
}

/// Judges whether `html` with extracted `text` is real content
///
/// Rules are checked in order and the first failing one decides:
///
/// 1. trimmed text shorter than 100 characters: too short
/// 2. fewer than 5 closing tags: no structure
/// 3. a "JavaScript disabled/required" phrase in the text: JS warning
/// 4. an empty `root`/`app`/`__next` mount point with under 500 characters
///    of text: unrendered SPA
///
/// # Examples
///
/// ```
/// use hivecrawl::extractor::validate_content;
///
/// let verdict = validate_content("<div id=\"root\"></div>", "Loading...");
/// assert!(!verdict.is_valid);
/// assert_eq!(verdict.reason.unwrap().as_str(), "too short");
/// ```
pub fn validate_content(html: &str, text: &str) -> ValidationVerdict {
    let text_length = text.trim().chars().count();
    let has_structure = html.matches("</").count() >= MIN_CLOSING_TAGS;

    let verdict = |reason: Option<InvalidReason>| ValidationVerdict {
        is_valid: reason.is_none(),
        reason,
        text_length,
        has_structure,
    };

    if text_length < MIN_TEXT_LENGTH {
        return verdict(Some(InvalidReason::TooShort));
    }

    if !has_structure {
        return verdict(Some(InvalidReason::NoStructure));
    }

    let lower = text.to_lowercase();
    if JS_WARNINGS.iter().any(|phrase| lower.contains(phrase)) {
        return verdict(Some(InvalidReason::JsWarning));
    }

    if text_length < SPA_TEXT_LENGTH && EMPTY_MOUNT_MARKERS.iter().any(|m| html.contains(m)) {
        return verdict(Some(InvalidReason::UnrenderedSpa));
    }

    verdict(None)
}

/// Heuristic pre-filter: does this page look like it needs a browser?
///
/// True when the HTML carries a framework hydration marker, or when it has an
/// empty-state marker and the body holds under 100 characters of markup.
pub fn needs_javascript(html: &str) -> bool {
    if FRAMEWORK_MARKERS.iter().any(|m| html.contains(m)) {
        return true;
    }

    let has_empty_state =
        EMPTY_MOUNT_MARKERS.iter().any(|m| html.contains(m)) || html.contains("noscript");
    if !has_empty_state {
        return false;
    }

    let body = body_regex()
        .and_then(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");

    body.trim().len() < MIN_TEXT_LENGTH
}

fn body_regex() -> Option<&'static Regex> {
    static BODY: OnceLock<Option<Regex>> = OnceLock::new();
    BODY.get_or_init(|| Regex::new(r"(?s)<body[^>]*>(.*)</body>").ok())
        .as_ref()
}
