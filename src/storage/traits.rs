//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{BlobRecord, DocumentRecord, NewDocument, NewSource, SourceRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every database operation the ingest pipeline needs.
/// Writes that belong together are bracketed by [`Storage::begin`] and
/// [`Storage::commit`] (or [`Storage::rollback`]).
pub trait Storage {
    // ===== Transactions =====

    /// Starts a write transaction
    fn begin(&mut self) -> StorageResult<()>;

    /// Commits the open transaction
    fn commit(&mut self) -> StorageResult<()>;

    /// Rolls back the open transaction
    fn rollback(&mut self) -> StorageResult<()>;

    // ===== Sources =====

    /// Gets the most recent source row for an exact URL
    fn latest_source(&self, url: &str) -> StorageResult<Option<SourceRecord>>;

    /// Gets a source by ID
    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord>;

    /// Inserts a new source row
    ///
    /// # Returns
    ///
    /// The ID of the new row
    fn insert_source(&mut self, source: &NewSource<'_>) -> StorageResult<i64>;

    /// Records a fetch whose content did not change
    ///
    /// Only `http_status`, `etag` and `last_fetched_at` are updated.
    fn touch_source(
        &mut self,
        source_id: i64,
        http_status: u16,
        etag: Option<&str>,
    ) -> StorageResult<()>;

    /// Records a fetch with new content
    ///
    /// Updates the checksum, status, etag, source type and `last_fetched_at`.
    fn update_source_content(
        &mut self,
        source_id: i64,
        source_type: &str,
        http_status: u16,
        etag: Option<&str>,
        checksum: &str,
    ) -> StorageResult<()>;

    // ===== Documents =====

    /// Gets the most recent document of a source
    fn latest_document(&self, source_id: i64) -> StorageResult<Option<DocumentRecord>>;

    /// Gets a document by ID
    fn get_document(&self, document_id: i64) -> StorageResult<Option<DocumentRecord>>;

    /// Inserts a document row
    fn insert_document(&mut self, document: &NewDocument<'_>) -> StorageResult<i64>;

    // ===== Blobs =====

    /// Stores bytes under their checksum
    ///
    /// # Returns
    ///
    /// The ID of the blob row; an existing row with the same checksum is reused
    fn store_blob(&mut self, checksum: &str, content_type: &str, bytes: &[u8])
        -> StorageResult<i64>;

    /// Gets a blob by ID
    fn get_blob(&self, blob_id: i64) -> StorageResult<Option<BlobRecord>>;

    // ===== Statistics =====

    /// Counts source rows per source type
    fn count_sources_by_type(&self) -> StorageResult<HashMap<String, u64>>;

    /// Gets total document count
    fn count_documents(&self) -> StorageResult<u64>;

    /// Counts documents with a detected publication date
    fn count_dated_documents(&self) -> StorageResult<u64>;

    /// Counts documents with at least one contact email
    fn count_documents_with_contacts(&self) -> StorageResult<u64>;

    /// Gets blob count and total stored bytes
    fn blob_totals(&self) -> StorageResult<(u64, u64)>;

    /// Counts sources whose last fetch returned 400 or above
    fn count_error_sources(&self) -> StorageResult<u64>;

    /// Most recent `last_fetched_at` over all sources
    fn last_fetched_at(&self) -> StorageResult<Option<String>>;
}
