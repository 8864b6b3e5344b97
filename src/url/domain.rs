use std::net::IpAddr;
use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// The domain is the partition key for the method cache and the crawl origin policy.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use hivecrawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://sub.example.com:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable domain (public suffix plus one label) of a host
///
/// IP addresses, single-label hosts such as `localhost` and bare public
/// suffixes have no registrable part and are returned whole.
///
/// # Examples
///
/// ```
/// use hivecrawl::url::registrable_domain;
///
/// assert_eq!(registrable_domain("blog.example.com"), "example.com");
/// assert_eq!(registrable_domain("www.bbc.co.uk"), "bbc.co.uk");
/// assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return host;
    }

    match psl::domain_str(&host) {
        Some(domain) => domain.to_string(),
        None => host,
    }
}

/// Checks whether a URL belongs to the same site as `start_domain`
///
/// Two hosts are one site when their registrable domains match. So
/// `www.example.com` and `blog.example.com` belong to `example.com`, while
/// `bbc.co.uk` and `itv.co.uk` are separate sites.
pub fn same_site(start_domain: &str, candidate: &Url) -> bool {
    match extract_domain(candidate) {
        Some(domain) => registrable_domain(&domain) == registrable_domain(start_domain),
        None => false,
    }
}
