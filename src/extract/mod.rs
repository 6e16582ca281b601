//! Content classification and metadata extraction
//!
//! This module handles:
//! - Deciding whether a fetched body is an HTML page or a PDF report
//! - Title, main text, headings and tags of HTML pages
//! - Publication dates (HTML and PDF)
//! - Contact people, emails and phone numbers on HTML pages
//!
//! Extraction never fails: every heuristic that finds nothing degrades to an
//! empty value.

pub mod contacts;
pub mod dates;
pub mod html;
pub mod locale;
pub mod pdf;

pub use contacts::{decode_cfemail, extract_contacts, Contact, ContactBook};
pub use dates::{html_published_date, parse_date_value};
pub use html::PageView;
pub use locale::{LocalePolicy, SwedishLocale};

use crate::url::is_pdf_url;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// MIME type of PDF reports, as stored with their blobs
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// The two kinds of content the pipeline ingests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Html,
    Pdf,
}

impl DocumentKind {
    /// PDF when the URL ends in `.pdf` or the server says `application/pdf`
    pub fn classify(url: &str, content_type: Option<&str>) -> Self {
        let pdf_content_type = content_type.map_or(false, |ct| {
            ct.trim().to_ascii_lowercase().starts_with(PDF_CONTENT_TYPE)
        });
        if is_pdf_url(url) || pdf_content_type {
            Self::Pdf
        } else {
            Self::Html
        }
    }

    /// Value of `source.source_type`
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    /// Value of `document.doc_type`
    pub fn doc_type(&self) -> &'static str {
        match self {
            Self::Html => "page",
            Self::Pdf => "report",
        }
    }
}

/// Contacts as stored in `document.contacts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    /// Every contact email, lowercased, in first-seen order
    pub emails: Vec<String>,
    /// Every valid phone number on the page, normalized
    pub phones: Vec<String>,
    pub people: Vec<Contact>,
}

impl ContactSummary {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty()
    }
}

/// Metadata of one fetched content version
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub kind: DocumentKind,
    pub title: Option<String>,
    pub text_plain: String,
    pub published_at: Option<NaiveDate>,
    pub headings: Vec<String>,
    pub tags: Vec<String>,
    pub contacts: ContactSummary,
}

impl ExtractedDocument {
    fn empty(kind: DocumentKind) -> Self {
        Self {
            kind,
            title: None,
            text_plain: String::new(),
            published_at: None,
            headings: Vec::new(),
            tags: Vec::new(),
            contacts: ContactSummary::default(),
        }
    }
}

/// Turns fetched bodies into [`ExtractedDocument`]s
///
/// Locale-specific rules (month names, roles, phone formats) come from the
/// [`LocalePolicy`] the extractor is built with.
#[derive(Debug)]
pub struct MetadataExtractor {
    locale: Box<dyn LocalePolicy>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(SwedishLocale)
    }
}

impl MetadataExtractor {
    pub fn new(locale: impl LocalePolicy + 'static) -> Self {
        Self {
            locale: Box::new(locale),
        }
    }

    pub fn locale(&self) -> &dyn LocalePolicy {
        self.locale.as_ref()
    }

    /// Extracts metadata from a response body
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the response (used for readability and filename dates)
    /// * `kind` - Result of [`DocumentKind::classify`]
    /// * `body` - Raw response bytes
    pub fn extract(&self, url: &str, kind: DocumentKind, body: &[u8]) -> ExtractedDocument {
        match kind {
            DocumentKind::Html => self.extract_html(url, body),
            DocumentKind::Pdf => self.extract_pdf(url, body),
        }
    }

    fn extract_html(&self, url: &str, body: &[u8]) -> ExtractedDocument {
        let source = String::from_utf8_lossy(body);
        let page = PageView::parse(&source);
        let (text_plain, title) = html::main_text_and_title(&source, url, &page);

        let people = extract_contacts(&page, self.locale());
        let mut seen_phones = HashSet::new();
        let phones: Vec<String> = page
            .lines()
            .iter()
            .flat_map(|line| self.locale.find_phones(line))
            .filter(|phone| seen_phones.insert(phone.clone()))
            .collect();

        ExtractedDocument {
            title,
            text_plain,
            published_at: html_published_date(&page, self.locale()),
            headings: html::extract_headings(page.document()),
            tags: html::extract_tags(&page),
            contacts: ContactSummary {
                emails: people.iter().map(|c| c.email.clone()).collect(),
                phones,
                people,
            },
            ..ExtractedDocument::empty(DocumentKind::Html)
        }
    }

    fn extract_pdf(&self, url: &str, body: &[u8]) -> ExtractedDocument {
        let text_plain = pdf::first_pages_text(body).unwrap_or_default();
        let info = pdf::PdfInfo::read(body);
        let source = pdf::PdfSource {
            url,
            bytes: body,
            text: &text_plain,
            info: &info,
        };
        let published_at = pdf::pdf_published_date(&source, self.locale());

        ExtractedDocument {
            title: Some(pdf::pdf_title(url)),
            published_at,
            text_plain,
            ..ExtractedDocument::empty(DocumentKind::Pdf)
        }
    }
}
