//! Configuration module for HiveCrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so `Config::default()` is a complete, valid
//! configuration.
//!
//! # Example
//!
//! ```no_run
//! use hivecrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("hivecrawl.toml")).unwrap();
//! println!("Crawls default to depth {}", config.crawl.default_max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlConfig, ExtractorConfig, FetchMode, LimiterConfig, RendererConfig,
    SearchConfig, SecurityConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
