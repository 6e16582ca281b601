//! Statistics generation from the ingest database
//!
//! This module provides functionality for extracting and displaying
//! store statistics from the storage layer.

use crate::storage::{Storage, StorageError};
use std::collections::HashMap;

/// Store statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Source rows per source type (`html`, `pdf`)
    pub sources_by_type: HashMap<String, u64>,

    /// Total number of document rows
    pub documents: u64,

    /// Documents with a detected publication date
    pub dated_documents: u64,

    /// Documents with at least one contact email
    pub documents_with_contacts: u64,

    /// Number of stored blobs
    pub blobs: u64,

    /// Total size of stored blobs in bytes
    pub blob_bytes: u64,

    /// Sources whose last fetch returned an error status
    pub error_sources: u64,

    /// Most recent fetch time over all sources
    pub last_fetched_at: Option<String>,
}

impl StoreStatistics {
    pub fn total_sources(&self) -> u64 {
        self.sources_by_type.values().sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<StoreStatistics, StorageError> {
    let (blobs, blob_bytes) = storage.blob_totals()?;

    Ok(StoreStatistics {
        sources_by_type: storage.count_sources_by_type()?,
        documents: storage.count_documents()?,
        dated_documents: storage.count_dated_documents()?,
        documents_with_contacts: storage.count_documents_with_contacts()?,
        blobs,
        blob_bytes,
        error_sources: storage.count_error_sources()?,
        last_fetched_at: storage.last_fetched_at()?,
    })
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    let total_sources = stats.total_sources();

    println!("=== Store Statistics ===\n");

    println!("Sources: {}", total_sources);
    let mut by_type: Vec<_> = stats.sources_by_type.iter().collect();
    by_type.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (source_type, count) in by_type {
        println!(
            "  {}: {} ({:.1}%)",
            source_type,
            count,
            percentage(*count, total_sources)
        );
    }
    println!("  With error status: {}", stats.error_sources);
    println!();

    println!("Documents: {}", stats.documents);
    println!(
        "  With publish date: {} ({:.1}%)",
        stats.dated_documents,
        percentage(stats.dated_documents, stats.documents)
    );
    println!(
        "  With contacts: {} ({:.1}%)",
        stats.documents_with_contacts,
        percentage(stats.documents_with_contacts, stats.documents)
    );
    println!();

    println!("Blobs: {} ({} bytes)", stats.blobs, stats.blob_bytes);

    if let Some(last) = &stats.last_fetched_at {
        println!("Last fetch: {}", last);
    }
}
