//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{BlobRecord, DocumentRecord, NewDocument, NewSource, SourceRecord};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const SOURCE_COLUMNS: &str = "id, url, source_type, discovered_at, last_fetched_at, http_status, \
                              etag, checksum_sha256, robots_allowed";

const DOCUMENT_COLUMNS: &str = "id, source_id, doc_type, title, text_plain, published_at, \
                                headings, contacts, tags, checksum_sha256, blob_id, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        source_type: row.get(2)?,
        discovered_at: row.get(3)?,
        last_fetched_at: row.get(4)?,
        http_status: row.get(5)?,
        etag: row.get(6)?,
        checksum: row.get(7)?,
        robots_allowed: row.get(8)?,
    })
}

/// A document row before its JSON columns are decoded
struct RawDocument {
    id: i64,
    source_id: i64,
    doc_type: String,
    title: Option<String>,
    text_plain: String,
    published_at: Option<String>,
    headings: String,
    contacts: String,
    tags: String,
    checksum: String,
    blob_id: Option<i64>,
    created_at: String,
}

impl RawDocument {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            doc_type: row.get(2)?,
            title: row.get(3)?,
            text_plain: row.get(4)?,
            published_at: row.get(5)?,
            headings: row.get(6)?,
            contacts: row.get(7)?,
            tags: row.get(8)?,
            checksum: row.get(9)?,
            blob_id: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn decode(self) -> StorageResult<DocumentRecord> {
        Ok(DocumentRecord {
            id: self.id,
            source_id: self.source_id,
            doc_type: self.doc_type,
            title: self.title,
            text_plain: self.text_plain,
            published_at: self
                .published_at
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            headings: serde_json::from_str(&self.headings)?,
            contacts: serde_json::from_str(&self.contacts)?,
            tags: serde_json::from_str(&self.tags)?,
            checksum: self.checksum,
            blob_id: self.blob_id,
            created_at: self.created_at,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Transactions =====

    fn begin(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // ===== Sources =====

    fn latest_source(&self, url: &str) -> StorageResult<Option<SourceRecord>> {
        let source = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM source WHERE url = ?1 ORDER BY id DESC LIMIT 1",
                    SOURCE_COLUMNS
                ),
                params![url],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord> {
        let source = self
            .conn
            .query_row(
                &format!("SELECT {} FROM source WHERE id = ?1", SOURCE_COLUMNS),
                params![source_id],
                source_from_row,
            )
            .optional()?;
        source.ok_or(StorageError::SourceNotFound(source_id))
    }

    fn insert_source(&mut self, source: &NewSource<'_>) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO source (url, source_type, discovered_at, last_fetched_at, http_status,
             etag, checksum_sha256, robots_allowed)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7)",
            params![
                source.url,
                source.source_type,
                now,
                source.http_status,
                source.etag,
                source.checksum,
                source.robots_allowed
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn touch_source(
        &mut self,
        source_id: i64,
        http_status: u16,
        etag: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE source SET http_status = ?1, etag = ?2, last_fetched_at = ?3 WHERE id = ?4",
            params![http_status, etag, now, source_id],
        )?;
        Ok(())
    }

    fn update_source_content(
        &mut self,
        source_id: i64,
        source_type: &str,
        http_status: u16,
        etag: Option<&str>,
        checksum: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE source SET source_type = ?1, http_status = ?2, etag = ?3,
             checksum_sha256 = ?4, last_fetched_at = ?5 WHERE id = ?6",
            params![source_type, http_status, etag, checksum, now, source_id],
        )?;
        Ok(())
    }

    // ===== Documents =====

    fn latest_document(&self, source_id: i64) -> StorageResult<Option<DocumentRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM document WHERE source_id = ?1 ORDER BY id DESC LIMIT 1",
                    DOCUMENT_COLUMNS
                ),
                params![source_id],
                RawDocument::from_row,
            )
            .optional()?;
        raw.map(RawDocument::decode).transpose()
    }

    fn get_document(&self, document_id: i64) -> StorageResult<Option<DocumentRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM document WHERE id = ?1", DOCUMENT_COLUMNS),
                params![document_id],
                RawDocument::from_row,
            )
            .optional()?;
        raw.map(RawDocument::decode).transpose()
    }

    fn insert_document(&mut self, document: &NewDocument<'_>) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let published_at = document
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string());

        self.conn.execute(
            "INSERT INTO document (source_id, doc_type, title, text_plain, published_at,
             headings, contacts, tags, checksum_sha256, blob_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                document.source_id,
                document.doc_type,
                document.title,
                document.text_plain,
                published_at,
                serde_json::to_string(document.headings)?,
                serde_json::to_string(document.contacts)?,
                serde_json::to_string(document.tags)?,
                document.checksum,
                document.blob_id,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ===== Blobs =====

    fn store_blob(
        &mut self,
        checksum: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO blob_store
             (content_type, content_length, checksum_sha256, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![content_type, bytes.len() as i64, checksum, bytes, now],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM blob_store WHERE checksum_sha256 = ?1",
            params![checksum],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_blob(&self, blob_id: i64) -> StorageResult<Option<BlobRecord>> {
        let blob = self
            .conn
            .query_row(
                "SELECT id, content_type, content_length, checksum_sha256, data
                 FROM blob_store WHERE id = ?1",
                params![blob_id],
                |row| {
                    Ok(BlobRecord {
                        id: row.get(0)?,
                        content_type: row.get(1)?,
                        content_length: row.get::<_, i64>(2)? as u64,
                        checksum: row.get(3)?,
                        data: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(blob)
    }

    // ===== Statistics =====

    fn count_sources_by_type(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_type, COUNT(*) FROM source GROUP BY source_type")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(rows)
    }

    fn count_documents(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM document")
    }

    fn count_dated_documents(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM document WHERE published_at IS NOT NULL")
    }

    fn count_documents_with_contacts(&self) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM document
             WHERE json_array_length(json_extract(contacts, '$.emails')) > 0",
        )
    }

    fn blob_totals(&self) -> StorageResult<(u64, u64)> {
        let (count, bytes): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(content_length), 0) FROM blob_store",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count as u64, bytes as u64))
    }

    fn count_error_sources(&self) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM source s
             WHERE s.id = (SELECT MAX(id) FROM source WHERE url = s.url)
             AND s.http_status >= 400",
        )
    }

    fn last_fetched_at(&self) -> StorageResult<Option<String>> {
        let last: Option<String> =
            self.conn
                .query_row("SELECT MAX(last_fetched_at) FROM source", [], |row| {
                    row.get(0)
                })?;
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Contact, ContactSummary};

    fn new_source<'a>(url: &'a str, checksum: Option<&'a str>) -> NewSource<'a> {
        NewSource {
            url,
            source_type: "html",
            http_status: 200,
            etag: Some("\"v1\""),
            checksum,
            robots_allowed: true,
        }
    }

    fn new_document<'a>(
        source_id: i64,
        checksum: &'a str,
        contacts: &'a ContactSummary,
        headings: &'a [String],
    ) -> NewDocument<'a> {
        NewDocument {
            source_id,
            doc_type: "page",
            title: Some("Investerare"),
            text_plain: "text",
            published_at: NaiveDate::from_ymd_opt(2024, 3, 12),
            headings,
            contacts,
            tags: &[],
            checksum,
            blob_id: None,
        }
    }

    #[test]
    fn test_latest_source_is_most_recent_row() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage
            .insert_source(&new_source("https://example.se/", Some("a")))
            .unwrap();
        let second = storage
            .insert_source(&new_source("https://example.se/", Some("b")))
            .unwrap();
        assert!(second > first);

        let latest = storage.latest_source("https://example.se/").unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.checksum.as_deref(), Some("b"));
        assert!(latest.robots_allowed);
        assert!(storage.latest_source("https://example.se/x").unwrap().is_none());
    }

    #[test]
    fn test_touch_source_keeps_checksum() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage
            .insert_source(&new_source("https://example.se/", Some("a")))
            .unwrap();
        storage.touch_source(id, 304, Some("\"v2\"")).unwrap();

        let source = storage.get_source(id).unwrap();
        assert_eq!(source.http_status, Some(304));
        assert_eq!(source.etag.as_deref(), Some("\"v2\""));
        assert_eq!(source.checksum.as_deref(), Some("a"));
    }

    #[test]
    fn test_update_source_content() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage
            .insert_source(&new_source("https://example.se/q1", Some("a")))
            .unwrap();
        storage
            .update_source_content(id, "pdf", 200, None, "b")
            .unwrap();

        let source = storage.get_source(id).unwrap();
        assert_eq!(source.source_type, "pdf");
        assert_eq!(source.checksum.as_deref(), Some("b"));
        assert_eq!(source.etag, None);
    }

    #[test]
    fn test_document_roundtrip_json_columns() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let source_id = storage
            .insert_source(&new_source("https://example.se/", Some("a")))
            .unwrap();

        let contacts = ContactSummary {
            emails: vec!["ir@example.se".into()],
            phones: vec!["08-123 45 67".into()],
            people: vec![Contact {
                email: "ir@example.se".into(),
                name: Some("Anna Svensson".into()),
                ..Default::default()
            }],
        };
        let headings = vec!["Rapporter".to_string()];
        let id = storage
            .insert_document(&new_document(source_id, "a", &contacts, &headings))
            .unwrap();

        let doc = storage.latest_document(source_id).unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.doc_type, "page");
        assert_eq!(doc.headings, headings);
        assert_eq!(doc.contacts, contacts);
        assert_eq!(doc.published_at, NaiveDate::from_ymd_opt(2024, 3, 12));
        assert_eq!(storage.count_documents().unwrap(), 1);
        assert_eq!(storage.count_dated_documents().unwrap(), 1);
        assert_eq!(storage.count_documents_with_contacts().unwrap(), 1);
    }

    #[test]
    fn test_store_blob_reuses_checksum() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.store_blob("abc", "application/pdf", b"%PDF-1.4").unwrap();
        let second = storage.store_blob("abc", "application/pdf", b"%PDF-1.4").unwrap();
        let other = storage
            .store_blob("def", "application/pdf", b"%PDF-1.5 other")
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(storage.blob_totals().unwrap(), (2, 22));
    }

    #[test]
    fn test_get_blob_columns() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage.store_blob("abc", "application/pdf", b"%PDF-1.4").unwrap();

        let blob = storage.get_blob(id).unwrap().unwrap();
        assert_eq!(blob.content_type, "application/pdf");
        assert_eq!(blob.content_length, 8);
        assert_eq!(blob.checksum, "abc");
        assert_eq!(blob.data, b"%PDF-1.4");
        assert!(storage.get_blob(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.begin().unwrap();
        storage
            .insert_source(&new_source("https://example.se/", None))
            .unwrap();
        storage.rollback().unwrap();
        assert!(storage.latest_source("https://example.se/").unwrap().is_none());

        storage.begin().unwrap();
        storage
            .insert_source(&new_source("https://example.se/", None))
            .unwrap();
        storage.commit().unwrap();
        assert!(storage.latest_source("https://example.se/").unwrap().is_some());
    }

    #[test]
    fn test_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert_source(&new_source("https://example.se/", Some("a")))
            .unwrap();
        let pdf = NewSource {
            source_type: "pdf",
            ..new_source("https://example.se/q1.pdf", Some("b"))
        };
        storage.insert_source(&pdf).unwrap();
        let missing = NewSource {
            http_status: 404,
            ..new_source("https://example.se/gone", None)
        };
        storage.insert_source(&missing).unwrap();

        let by_type = storage.count_sources_by_type().unwrap();
        assert_eq!(by_type.get("html"), Some(&2));
        assert_eq!(by_type.get("pdf"), Some(&1));
        assert_eq!(storage.count_error_sources().unwrap(), 1);
        assert!(storage.last_fetched_at().unwrap().is_some());
        assert_eq!(storage.blob_totals().unwrap(), (0, 0));
    }
}
