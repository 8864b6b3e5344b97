use crate::UrlError;
use url::Url;

/// Query parameters that only carry campaign attribution
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Normalizes a URL into the key used for crawl deduplication
///
/// Two URLs that normalize to the same string are the same page for the
/// purpose of the crawl visited-set. The scheme and any `www.` prefix are kept
/// as written; only presentation differences are folded away:
///
/// - host lowercased
/// - fragment removed
/// - dot segments and repeated slashes removed, trailing slash dropped
///   (the root path stays `/`)
/// - tracking parameters (`utm_*`, `fbclid`, `gclid`, `mc_eid`) removed and the
///   rest sorted by key; an empty query is dropped entirely
///
/// # Examples
///
/// ```
/// use hivecrawl::url::normalize_url;
///
/// let url = normalize_url("http://Example.COM/docs/./intro/#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs/intro");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = collapse_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let query = canonical_query(&url);
        url.set_query(query.as_deref());
    }

    Ok(url)
}

/// Resolves `.`/`..` segments, drops empty segments and the trailing slash
fn collapse_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    format!("/{}", stack.join("/"))
}

/// Builds the sorted, tracking-free query string, or `None` when nothing remains
fn canonical_query(url: &Url) -> Option<String> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        return None;
    }

    params.sort();

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &params {
        serializer.append_pair(key, value);
    }
    Some(serializer.finish())
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
