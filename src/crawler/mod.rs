//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with TLS options and retry logic
//! - HTML link extraction and sitemap reading
//! - Seed discovery (IR hosts, well-known paths, investor probe)
//! - The tiered frontier and the pre-fetch checks
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod filter;
mod frontier;
mod parser;
mod seeds;
mod sitemap;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use fetcher::{
    backoff_delay, build_http_client, FetchResult, Fetcher, TlsPolicy, MAX_BACKOFF,
};
pub use filter::{CrawlFilter, SkipReason};
pub use frontier::{CrawlTask, Frontier, Tier};
pub use parser::{extract_links, DEFAULT_MAX_LINKS};
pub use seeds::{
    discover_ir_hosts, guess_investor_start, is_ir_host, well_known_seeds, WELL_KNOWN_PATHS,
};
pub use sitemap::{fetch_sitemap, parse_sitemap, sitemap_links, SitemapDocument};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the store named by the configuration
/// 2. Resolve and ingest the start URL
/// 3. Seed the frontier from IR hosts, well-known paths and the sitemap
/// 4. Fetch, ingest and follow links until the frontier or page budget is exhausted
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(CrawlError)` - Crawl could not start
pub async fn crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    run_crawl(config).await
}
