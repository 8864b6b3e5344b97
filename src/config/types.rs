use serde::Deserialize;
use std::time::Duration;

/// Default browser-like user agent sent by the static fetcher and renderer
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for HiveCrawl
///
/// Every section is optional; a missing section (or an empty file) yields the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limiter: LimiterConfig,
    pub cache: CacheConfig,
    pub extractor: ExtractorConfig,
    pub renderer: RendererConfig,
    pub crawl: CrawlConfig,
    pub search: SearchConfig,
    pub security: SecurityConfig,
}

/// Per-client admission policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Minimum spacing between two admissions for the same key (milliseconds)
    #[serde(rename = "min-interval-ms")]
    pub min_interval_ms: u64,

    /// Maximum simultaneous in-flight operations per key
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: u32,

    /// Reservoir capacity
    pub reservoir: u32,

    /// Operations added back to the reservoir on every refill
    #[serde(rename = "refill-amount")]
    pub refill_amount: u32,

    /// Time between refills (milliseconds)
    #[serde(rename = "refill-interval-ms")]
    pub refill_interval_ms: u64,

    /// Longest a caller may wait for admission before it is rejected (milliseconds)
    #[serde(rename = "max-wait-ms")]
    pub max_wait_ms: u64,

    /// Reject instead of queueing when the reservoir is empty
    #[serde(rename = "reject-when-exhausted")]
    pub reject_when_exhausted: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            max_concurrent: 3,
            reservoir: 100,
            refill_amount: 100,
            refill_interval_ms: 60_000,
            max_wait_ms: 120_000,
            reject_when_exhausted: false,
        }
    }
}

/// Method cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of an entry after its last write (seconds)
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    /// Period of the background sweep (seconds)
    #[serde(rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Single-page extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Default per-method timeout (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Response size ceiling for the static fetch (bytes)
    #[serde(rename = "max-content-bytes")]
    pub max_content_bytes: u64,

    /// Redirects followed by the static fetch before it gives up
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_content_bytes: 10 * 1024 * 1024,
            max_redirects: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Rendered fetch (WebDriver) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium)
    #[serde(rename = "webdriver-url")]
    pub webdriver_url: String,

    pub headless: bool,

    /// Maximum simultaneously open browser sessions
    #[serde(rename = "max-sessions")]
    pub max_sessions: usize,

    /// How long a wait-for-selector hint may block (milliseconds)
    #[serde(rename = "selector-timeout-ms")]
    pub selector_timeout_ms: u64,

    #[serde(rename = "window-width")]
    pub window_width: u32,

    #[serde(rename = "window-height")]
    pub window_height: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            max_sessions: 4,
            selector_timeout_ms: 10_000,
            window_width: 1280,
            window_height: 720,
        }
    }
}

/// How a crawl fetches each page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// One isolated render session for the whole crawl
    #[default]
    Rendered,
    /// Run the adaptive extractor for every page
    Adaptive,
}

/// Crawl defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    #[serde(rename = "default-max-pages")]
    pub default_max_pages: u32,

    #[serde(rename = "default-max-depth")]
    pub default_max_depth: u32,

    #[serde(rename = "same-origin")]
    pub same_origin: bool,

    /// Pause between consecutive page fetches (milliseconds)
    #[serde(rename = "page-delay-ms")]
    pub page_delay_ms: u64,

    #[serde(rename = "fetch-mode")]
    pub fetch_mode: FetchMode,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            default_max_pages: 50,
            default_max_depth: 3,
            same_origin: true,
            page_delay_ms: 3000,
            fetch_mode: FetchMode::Rendered,
        }
    }
}

/// Web search configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the HTML/lite search frontends
    pub endpoint: String,

    /// Base URL of the instant answer API
    #[serde(rename = "api-endpoint")]
    pub api_endpoint: String,

    #[serde(rename = "default-limit")]
    pub default_limit: usize,

    #[serde(rename = "max-limit")]
    pub max_limit: usize,

    pub region: String,

    /// HTML frontend attempts before falling back
    pub attempts: u32,

    /// Base delay between attempts, multiplied by the attempt number (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://duckduckgo.com".to_string(),
            api_endpoint: "https://api.duckduckgo.com".to_string(),
            default_limit: 10,
            max_limit: 50,
            region: "wt-wt".to_string(),
            attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

/// Inbound request restrictions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Permit loopback, link-local and private-network targets
    #[serde(rename = "allow-private-hosts")]
    pub allow_private_hosts: bool,
}
