//! Output module for crawl reports and store statistics
//!
//! This module handles:
//! - Printing the per-run crawl report
//! - Printing statistics of the ingest database

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};

use crate::crawler::{CrawlReport, SkipReason};

/// Prints the counters of a finished crawl to stdout
pub fn print_crawl_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("Start URL: {}", report.start_url);
    println!("Ingested: {}", report.ingested);
    println!("  New: {}", report.new_documents);
    println!("  Changed: {}", report.changed_documents);
    println!("  Unchanged: {}", report.unchanged);
    println!("  Error status: {}", report.error_status);
    println!("Failed: {}", report.failed);

    let skipped = report.total_skipped();
    println!("Skipped: {}", skipped);
    if skipped > 0 {
        for reason in [
            SkipReason::External,
            SkipReason::Robots,
            SkipReason::Filtered,
            SkipReason::HostNotAllowed,
        ] {
            let count = report.skipped_for(reason);
            if count > 0 {
                println!("  {}: {}", reason, count);
            }
        }
    }
}
