//! Ingestion and content deduplication
//!
//! Every fetched response is recorded against the most recent `source` row
//! for its URL. A new Document is only written when the body checksum
//! differs from the stored one; repeated fetches of unchanged content just
//! refresh the fetch metadata.

use crate::crawler::{FetchResult, Fetcher};
use crate::extract::{DocumentKind, MetadataExtractor, PDF_CONTENT_TYPE};
use crate::storage::{NewDocument, NewSource, SourceRecord, Storage};
use crate::CrawlError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// What an ingest did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// First content for this URL: source (if needed) and document inserted
    New,
    /// Content differs from the stored checksum: new document inserted
    Changed,
    /// Same checksum as stored: only fetch metadata refreshed
    Unchanged,
    /// Status 400 or above: fetch metadata recorded, no document
    ErrorStatus,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::ErrorStatus => "error-status",
        };
        f.write_str(label)
    }
}

/// Result of recording one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub source_id: i64,
    /// The document for the current content (the previous one for error statuses)
    pub document_id: Option<i64>,
    pub http_status: u16,
    /// Hex SHA-256 of the response body
    pub checksum: String,
    pub change: ChangeKind,
    pub kind: DocumentKind,
}

/// Hex-encoded SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Reads the URLs of an ingest list
///
/// The CSV file either has a header row with a `url` column (matched
/// case-insensitively) or carries the URLs in its first column. Empty cells
/// are skipped; values are returned as written.
pub fn read_url_list(path: &Path) -> Result<Vec<String>, CrawlError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut urls = Vec::new();
    let mut column = 0;
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if index == 0 {
            if let Some(position) = record.iter().position(|f| f.eq_ignore_ascii_case("url")) {
                column = position;
                continue;
            }
        }
        match record.get(column) {
            Some(value) if !value.is_empty() => urls.push(value.to_string()),
            _ => {}
        }
    }
    Ok(urls)
}

/// Records responses in the store, one transaction per response
pub struct Ingestor<S: Storage> {
    storage: S,
    extractor: MetadataExtractor,
    store_blobs: bool,
}

impl<S: Storage> Ingestor<S> {
    /// Creates an ingestor
    ///
    /// # Arguments
    ///
    /// * `storage` - The store to write to
    /// * `extractor` - Metadata extractor applied to new content
    /// * `store_blobs` - Keep raw PDF bytes in the blob store
    pub fn new(storage: S, extractor: MetadataExtractor, store_blobs: bool) -> Self {
        Self {
            storage,
            extractor,
            store_blobs,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Fetches a URL and records the response
    ///
    /// # Returns
    ///
    /// * `Ok(IngestOutcome)` - The response was recorded (whatever its status)
    /// * `Err(CrawlError)` - The fetch failed after all retries, or the store failed
    pub async fn ingest(&mut self, fetcher: &Fetcher, url: &str) -> Result<IngestOutcome, CrawlError> {
        let response = fetcher.fetch(url).await?;
        self.record(url, &response)
    }

    /// Records an already fetched response for `url`
    ///
    /// All writes happen in a single transaction; on error nothing is kept.
    pub fn record(&mut self, url: &str, response: &FetchResult) -> Result<IngestOutcome, CrawlError> {
        self.storage.begin()?;
        match self.record_in_transaction(url, response) {
            Ok(outcome) => {
                self.storage.commit()?;
                tracing::debug!(
                    "Recorded {} ({}, status {}, source {}, document {:?})",
                    url,
                    outcome.change,
                    outcome.http_status,
                    outcome.source_id,
                    outcome.document_id
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = self.storage.rollback() {
                    tracing::warn!("Rollback failed for {}: {}", url, rollback_err);
                }
                Err(e)
            }
        }
    }

    fn record_in_transaction(
        &mut self,
        url: &str,
        response: &FetchResult,
    ) -> Result<IngestOutcome, CrawlError> {
        let kind = DocumentKind::classify(url, response.content_type.as_deref());
        let checksum = sha256_hex(&response.body);
        let etag = response.etag.as_deref();
        let status = response.status_code;
        let existing = self.storage.latest_source(url)?;

        let outcome = |source_id, document_id, change| IngestOutcome {
            source_id,
            document_id,
            http_status: status,
            checksum: checksum.clone(),
            change,
            kind,
        };

        if !response.is_success() {
            return match existing {
                Some(source) => {
                    self.storage.touch_source(source.id, status, etag)?;
                    let previous = self.storage.latest_document(source.id)?.map(|d| d.id);
                    Ok(outcome(source.id, previous, ChangeKind::ErrorStatus))
                }
                None => {
                    let source_id = self.storage.insert_source(&NewSource {
                        url,
                        source_type: kind.source_type(),
                        http_status: status,
                        etag,
                        checksum: None,
                        robots_allowed: true,
                    })?;
                    Ok(outcome(source_id, None, ChangeKind::ErrorStatus))
                }
            };
        }

        if let Some(source) = existing
            .as_ref()
            .filter(|s| s.checksum.as_deref() == Some(checksum.as_str()))
        {
            self.storage.touch_source(source.id, status, etag)?;
            let document_id = self.storage.latest_document(source.id)?.map(|d| d.id);
            return Ok(outcome(source.id, document_id, ChangeKind::Unchanged));
        }

        let (source_id, change) = self.upsert_source(existing.as_ref(), url, kind, response, &checksum)?;

        let extracted = self
            .extractor
            .extract(&response.final_url, kind, &response.body);

        let blob_id = if kind == DocumentKind::Pdf && self.store_blobs {
            Some(
                self.storage
                    .store_blob(&checksum, PDF_CONTENT_TYPE, &response.body)?,
            )
        } else {
            None
        };

        let document_id = self.storage.insert_document(&NewDocument {
            source_id,
            doc_type: kind.doc_type(),
            title: extracted.title.as_deref(),
            text_plain: &extracted.text_plain,
            published_at: extracted.published_at,
            headings: &extracted.headings,
            contacts: &extracted.contacts,
            tags: &extracted.tags,
            checksum: &checksum,
            blob_id,
        })?;

        tracing::info!(
            "Stored {} document {} for {} (published {})",
            change,
            document_id,
            url,
            extracted
                .published_at
                .map_or_else(|| "unknown".to_string(), |d| d.to_string())
        );

        Ok(outcome(source_id, Some(document_id), change))
    }

    /// Inserts a source for a new URL or updates the content of an existing one
    fn upsert_source(
        &mut self,
        existing: Option<&SourceRecord>,
        url: &str,
        kind: DocumentKind,
        response: &FetchResult,
        checksum: &str,
    ) -> Result<(i64, ChangeKind), CrawlError> {
        let etag = response.etag.as_deref();
        match existing {
            Some(source) => {
                self.storage.update_source_content(
                    source.id,
                    kind.source_type(),
                    response.status_code,
                    etag,
                    checksum,
                )?;
                // A source that only ever saw error statuses has no content yet
                let change = if source.checksum.is_some() {
                    ChangeKind::Changed
                } else {
                    ChangeKind::New
                };
                Ok((source.id, change))
            }
            None => {
                let source_id = self.storage.insert_source(&NewSource {
                    url,
                    source_type: kind.source_type(),
                    http_status: response.status_code,
                    etag,
                    checksum: Some(checksum),
                    robots_allowed: true,
                })?;
                Ok((source_id, ChangeKind::New))
            }
        }
    }
}
