//! Storage module for persisting ingested content
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Source rows (one per fetched URL, latest row authoritative)
//! - Document rows (one per distinct content version)
//! - Content-addressed PDF blobs

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::ContactSummary;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Parses a database connection string
///
/// Accepted forms: `sqlite://<path>`, `sqlite:<path>`, `file:<path>`,
/// `:memory:` (also as the path of any prefixed form) or a bare path.
/// Any other URL scheme is rejected.
pub fn parse_database_url(database_url: &str) -> StorageResult<DatabaseLocation> {
    let trimmed = database_url.trim();
    if trimmed.is_empty() {
        return Err(StorageError::UnsupportedUrl(database_url.to_string()));
    }

    let path = ["sqlite://", "sqlite:", "file:"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix));
    let path = match path {
        Some(path) => path.split('?').next().unwrap_or(path),
        None if trimmed.contains("://") => {
            return Err(StorageError::UnsupportedUrl(database_url.to_string()));
        }
        None => trimmed,
    };

    match path {
        "" => Err(StorageError::UnsupportedUrl(database_url.to_string())),
        ":memory:" => Ok(DatabaseLocation::Memory),
        path => Ok(DatabaseLocation::File(PathBuf::from(path))),
    }
}

/// Opens (and initializes) the database named by a connection string
///
/// # Arguments
///
/// * `database_url` - Connection string, see [`parse_database_url`]
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Unsupported URL or failed to open the database
pub fn open_storage(database_url: &str) -> StorageResult<SqliteStorage> {
    match parse_database_url(database_url)? {
        DatabaseLocation::Memory => SqliteStorage::new_in_memory(),
        DatabaseLocation::File(path) => SqliteStorage::new(&path),
    }
}

/// A row of the `source` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: i64,
    pub url: String,
    pub source_type: String,
    pub discovered_at: String,
    pub last_fetched_at: Option<String>,
    pub http_status: Option<u16>,
    pub etag: Option<String>,
    pub checksum: Option<String>,
    pub robots_allowed: bool,
}

/// Values for a new `source` row
#[derive(Debug, Clone)]
pub struct NewSource<'a> {
    pub url: &'a str,
    pub source_type: &'a str,
    pub http_status: u16,
    pub etag: Option<&'a str>,
    /// `None` for responses whose body is not stored
    pub checksum: Option<&'a str>,
    pub robots_allowed: bool,
}

/// A row of the `document` table, JSON columns decoded
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: i64,
    pub source_id: i64,
    pub doc_type: String,
    pub title: Option<String>,
    pub text_plain: String,
    pub published_at: Option<NaiveDate>,
    pub headings: Vec<String>,
    pub contacts: ContactSummary,
    pub tags: Vec<String>,
    pub checksum: String,
    pub blob_id: Option<i64>,
    pub created_at: String,
}

/// A row of the `blob_store` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub id: i64,
    pub content_type: String,
    pub content_length: u64,
    pub checksum: String,
    pub data: Vec<u8>,
}

/// Values for a new `document` row
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub source_id: i64,
    pub doc_type: &'a str,
    pub title: Option<&'a str>,
    pub text_plain: &'a str,
    pub published_at: Option<NaiveDate>,
    pub headings: &'a [String],
    pub contacts: &'a ContactSummary,
    pub tags: &'a [String],
    pub checksum: &'a str,
    pub blob_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_url_forms() {
        assert_eq!(
            parse_database_url("sqlite:///var/data/ir.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/data/ir.db"))
        );
        assert_eq!(
            parse_database_url("sqlite://ir.db?mode=rwc").unwrap(),
            DatabaseLocation::File(PathBuf::from("ir.db"))
        );
        assert_eq!(
            parse_database_url("sqlite:data/ir.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("data/ir.db"))
        );
        assert_eq!(
            parse_database_url("file:ir.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("ir.db"))
        );
        assert_eq!(
            parse_database_url("./ir.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("./ir.db"))
        );
        assert_eq!(parse_database_url(":memory:").unwrap(), DatabaseLocation::Memory);
        assert_eq!(parse_database_url("sqlite::memory:").unwrap(), DatabaseLocation::Memory);
    }

    #[test]
    fn test_parse_database_url_rejects() {
        assert!(matches!(
            parse_database_url("postgres://user@localhost/ir"),
            Err(StorageError::UnsupportedUrl(_))
        ));
        assert!(parse_database_url("  ").is_err());
        assert!(parse_database_url("sqlite://").is_err());
    }

    #[test]
    fn test_open_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ir.db");
        let url = format!("sqlite://{}", path.display());
        assert!(open_storage(&url).is_ok());
        assert!(path.exists());
    }
}
