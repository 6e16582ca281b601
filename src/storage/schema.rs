//! Database schema definitions
//!
//! Every statement is idempotent, so the schema is applied on each open.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per fetched URL; the most recent row for a URL is authoritative
CREATE TABLE IF NOT EXISTS source (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    source_type TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    last_fetched_at TEXT,
    http_status INTEGER,
    etag TEXT,
    checksum_sha256 TEXT,
    robots_allowed INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_source_url ON source(url);

-- Raw PDF bytes, content-addressed
CREATE TABLE IF NOT EXISTS blob_store (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_type TEXT NOT NULL,
    content_length INTEGER NOT NULL,
    checksum_sha256 TEXT NOT NULL UNIQUE,
    data BLOB NOT NULL,
    created_at TEXT NOT NULL
);

-- One row per distinct content version of a source
CREATE TABLE IF NOT EXISTS document (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES source(id),
    doc_type TEXT NOT NULL,
    title TEXT,
    text_plain TEXT NOT NULL DEFAULT '',
    published_at TEXT,
    headings TEXT NOT NULL DEFAULT '[]',
    contacts TEXT NOT NULL DEFAULT '{}',
    tags TEXT NOT NULL DEFAULT '[]',
    checksum_sha256 TEXT NOT NULL,
    blob_id INTEGER REFERENCES blob_store(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_source ON document(source_id);
CREATE INDEX IF NOT EXISTS idx_document_checksum ON document(checksum_sha256);
"#;

/// Applies the schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
