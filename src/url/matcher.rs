use crate::{UrlError, UrlResult};
use regex::Regex;

/// A glob-style URL pattern compiled to an anchored regular expression
///
/// `*` matches any run of characters (including `/`), `?` matches exactly one
/// character, and everything else matches itself. The pattern must match the
/// whole URL string, not a substring.
///
/// # Examples
///
/// ```
/// use hivecrawl::url::GlobPattern;
///
/// let admin = GlobPattern::compile("*/admin/*").unwrap();
/// assert!(admin.matches("https://example.com/admin/users"));
/// assert!(!admin.matches("https://example.com/blog/admin"));
///
/// let page = GlobPattern::compile("https://example.com/page?").unwrap();
/// assert!(page.matches("https://example.com/page1"));
/// assert!(!page.matches("https://example.com/page10"));
/// ```
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob pattern
    pub fn compile(pattern: &str) -> UrlResult<Self> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| UrlError::Pattern(format!("'{}': {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Compiles every pattern in a list, failing on the first invalid one
    pub fn compile_all(patterns: &[String]) -> UrlResult<Vec<Self>> {
        patterns.iter().map(|p| Self::compile(p)).collect()
    }

    /// Returns true if the whole candidate matches
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Returns true if any pattern matches the candidate
pub fn matches_any(patterns: &[GlobPattern], candidate: &str) -> bool {
    patterns.iter().any(|p| p.matches(candidate))
}
