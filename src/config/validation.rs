use crate::config::types::{
    CacheConfig, Config, CrawlConfig, ExtractorConfig, LimiterConfig, RendererConfig, SearchConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_limiter_config(&config.limiter)?;
    validate_cache_config(&config.cache)?;
    validate_extractor_config(&config.extractor)?;
    validate_renderer_config(&config.renderer)?;
    validate_crawl_config(&config.crawl)?;
    validate_search_config(&config.search)?;
    Ok(())
}

fn validate_limiter_config(config: &LimiterConfig) -> Result<(), ConfigError> {
    at_least("limiter.max-concurrent", config.max_concurrent as u64, 1)?;
    at_least("limiter.reservoir", config.reservoir as u64, 1)?;
    at_least("limiter.refill-amount", config.refill_amount as u64, 1)?;
    at_least("limiter.refill-interval-ms", config.refill_interval_ms, 1)?;
    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    at_least("cache.ttl-secs", config.ttl_secs, 1)?;
    at_least("cache.sweep-interval-secs", config.sweep_interval_secs, 1)?;
    Ok(())
}

fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "extractor.timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    at_least("extractor.max-content-bytes", config.max_content_bytes, 1)?;

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "extractor.max-redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "extractor.user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    validate_endpoint("renderer.webdriver-url", &config.webdriver_url)?;
    at_least("renderer.max-sessions", config.max_sessions as u64, 1)?;
    at_least("renderer.window-width", config.window_width as u64, 1)?;
    at_least("renderer.window-height", config.window_height as u64, 1)?;
    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if !(1..=100).contains(&config.default_max_pages) {
        return Err(ConfigError::Validation(format!(
            "crawl.default-max-pages must be between 1 and 100, got {}",
            config.default_max_pages
        )));
    }

    if !(1..=5).contains(&config.default_max_depth) {
        return Err(ConfigError::Validation(format!(
            "crawl.default-max-depth must be between 1 and 5, got {}",
            config.default_max_depth
        )));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    validate_endpoint("search.endpoint", &config.endpoint)?;
    validate_endpoint("search.api-endpoint", &config.api_endpoint)?;

    if config.default_limit < 1 || config.default_limit > config.max_limit {
        return Err(ConfigError::Validation(format!(
            "search.default-limit must be between 1 and search.max-limit ({}), got {}",
            config.max_limit, config.default_limit
        )));
    }

    at_least("search.attempts", config.attempts as u64, 1)?;

    if config.region.trim().is_empty() {
        return Err(ConfigError::Validation(
            "search.region cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn at_least(name: &str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::Validation(format!(
            "{} must be >= {}, got {}",
            name, min, value
        )));
    }
    Ok(())
}

/// Endpoints must be absolute http(s) URLs
fn validate_endpoint(name: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", name, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name,
            url.scheme()
        )));
    }

    Ok(())
}
