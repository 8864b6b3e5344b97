//! HiveCrawl main entry point
//!
//! This is the command-line interface for the HiveCrawl extraction engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hivecrawl::api::{
    CrawlRequest, PatternSet, ScrapeRequest, ScrapeRequestOptions, SearchRequest, WaitFor,
};
use hivecrawl::config::{load_config_with_hash, Config};
use hivecrawl::{ApiResponse, Engine, HiveError, Method};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Client key the CLI is rate limited under
const CLI_CLIENT: &str = "cli";

/// HiveCrawl: adaptive web extraction
///
/// Extracts pages with the cheapest method that yields real content, crawls
/// sites within bounds, and runs web searches. Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "hivecrawl")]
#[command(version)]
#[command(about = "Adaptive web extraction and crawling", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a single page
    Scrape {
        url: String,

        /// Output format: markdown, html, json or text
        #[arg(short, long, default_value = "markdown")]
        format: String,

        /// Per-method timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// CSS selector to wait for when rendering
        #[arg(long, conflicts_with = "wait_ms")]
        wait_for: Option<String>,

        /// Milliseconds to wait after load when rendering
        #[arg(long)]
        wait_ms: Option<u64>,

        /// Capture a PNG screenshot (rendered pages only)
        #[arg(long)]
        screenshot: bool,

        /// Capture only the viewport instead of the full page
        #[arg(long, requires = "screenshot")]
        viewport_only: bool,

        /// Skip method selection: static or rendered
        #[arg(long)]
        method: Option<Method>,
    },

    /// Crawl a site breadth-first
    Crawl {
        url: String,

        #[arg(long)]
        max_pages: Option<u32>,

        #[arg(long)]
        max_depth: Option<u32>,

        /// Follow links to other sites too
        #[arg(long)]
        any_origin: bool,

        /// Glob a followed URL must match (repeatable)
        #[arg(long = "include", value_name = "PATTERN")]
        include: Vec<String>,

        /// Glob a followed URL must not match (repeatable)
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,
    },

    /// Search the web
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Region code such as us-en or wt-wt
        #[arg(short, long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let engine = Engine::new(config).context("failed to start engine")?;

    let status = match cli.command {
        Command::Scrape {
            url,
            format,
            timeout_ms,
            wait_for,
            wait_ms,
            screenshot,
            viewport_only,
            method,
        } => {
            let wait_for = wait_for
                .map(WaitFor::Selector)
                .or(wait_ms.map(WaitFor::Millis));
            let request = ScrapeRequest {
                url: Some(url),
                format: Some(format),
                options: ScrapeRequestOptions {
                    timeout_ms,
                    wait_for,
                    screenshot,
                    full_page: Some(!viewport_only),
                    force_method: method,
                },
            };
            print_response(engine.scrape(CLI_CLIENT, request).await)?
        }
        Command::Crawl {
            url,
            max_pages,
            max_depth,
            any_origin,
            include,
            exclude,
        } => {
            let request = CrawlRequest {
                url: Some(url),
                max_pages,
                max_depth,
                same_origin: any_origin.then_some(false),
                patterns: PatternSet { include, exclude },
            };
            print_response(engine.crawl(CLI_CLIENT, request).await)?
        }
        Command::Search {
            query,
            limit,
            region,
        } => {
            let request = SearchRequest {
                q: Some(query.join(" ")),
                limit,
                region,
            };
            print_response(engine.search(CLI_CLIENT, request).await)?
        }
    };

    if let Err(e) = engine.shutdown().await {
        tracing::warn!("Shutdown incomplete: {}", e);
    }

    Ok(ExitCode::from(status))
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout carries only the JSON result.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hivecrawl=info,warn"),
            1 => EnvFilter::new("hivecrawl=debug,info"),
            2 => EnvFilter::new("hivecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Prints the response envelope as pretty JSON and returns the exit status
fn print_response<T: Serialize>(result: hivecrawl::Result<T>) -> anyhow::Result<u8> {
    let status = match &result {
        Ok(_) => 0,
        Err(e) if e.is_input_error() => {
            tracing::warn!("Request rejected: {}", e);
            exit_status(e)
        }
        Err(e) => {
            tracing::error!("{} ({}): {}", e.code(), e.http_status(), e);
            exit_status(e)
        }
    };

    let response = ApiResponse::from_result(result);
    let json = serde_json::to_string_pretty(&response).context("failed to serialize response")?;
    println!("{}", json);

    Ok(status)
}

/// Exit status for a failed operation: 2 when the request itself was
/// rejected (as for a usage error), 1 when the operation failed
fn exit_status(error: &HiveError) -> u8 {
    if error.is_input_error() {
        2
    } else {
        1
    }
}
