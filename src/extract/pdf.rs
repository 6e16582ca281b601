//! PDF text and date extraction

use crate::extract::dates::{date_in_filename, numeric_date_in_text, parse_date_value, plausible};
use crate::extract::locale::LocalePolicy;
use chrono::NaiveDate;
use lopdf::{decode_text_string, Dictionary, Document, Object};
use regex::bytes::Regex as BytesRegex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::LazyLock;

/// Pages read from the start of each PDF
pub const TEXT_PAGES: usize = 2;

static CREATION_DATE_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"/CreationDate\s*\(D:(\d{8})").unwrap());

static MOD_DATE_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"/ModDate\s*\(D:(\d{8})").unwrap());

static XMP_CREATE_DATE_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r#"xmp:CreateDate(?:>|\s*=\s*")(\d{4}-\d{2}-\d{2})"#).unwrap()
});

/// Dates from the trailer `/Info` dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfInfo {
    pub creation_date: Option<NaiveDate>,
    pub mod_date: Option<NaiveDate>,
}

impl PdfInfo {
    /// Parses the document and reads its information dictionary
    ///
    /// Handles info dictionaries stored in object streams and UTF-16BE text
    /// strings. Any parse failure (or parser panic) gives empty dates.
    pub fn read(bytes: &[u8]) -> Self {
        let document = match catch_unwind(AssertUnwindSafe(|| Document::load_mem(bytes))) {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                tracing::debug!("PDF structure unreadable: {}", e);
                return Self::default();
            }
            Err(_) => {
                tracing::warn!("PDF parser panicked");
                return Self::default();
            }
        };

        let Ok(info) = document
            .trailer
            .get_deref(b"Info", &document)
            .and_then(Object::as_dict)
        else {
            return Self::default();
        };

        Self {
            creation_date: info_date(info, b"CreationDate", &document),
            mod_date: info_date(info, b"ModDate", &document),
        }
    }
}

fn info_date(info: &Dictionary, key: &[u8], document: &Document) -> Option<NaiveDate> {
    let value = info.get_deref(key, document).ok()?;
    let text = decode_text_string(value).ok()?;
    pdf_date(&text)
}

/// Date part of a PDF date string (`D:YYYYMMDDHHmmSS...`)
fn pdf_date(text: &str) -> Option<NaiveDate> {
    let digits = text.trim().trim_start_matches("D:");
    parse_date_value(digits.get(..8)?)
}

/// Everything a PDF date strategy may look at
pub struct PdfSource<'a> {
    pub url: &'a str,
    pub bytes: &'a [u8],
    pub text: &'a str,
    pub info: &'a PdfInfo,
}

/// A single PDF date heuristic
pub type PdfDateStrategy = fn(&PdfSource<'_>, &dyn LocalePolicy) -> Option<NaiveDate>;

/// PDF date strategies, in priority order
pub const PDF_DATE_STRATEGIES: &[(&str, PdfDateStrategy)] = &[
    ("info creation date", info_creation_date),
    ("info modification date", info_mod_date),
    ("xmp create date", xmp_create_date),
    ("text", text_date),
    ("filename", filename_date),
];

/// Text of the first [`TEXT_PAGES`] pages
///
/// Returns `None` when the text layer cannot be decoded. The decoder is run
/// under `catch_unwind` since malformed files can make it panic.
pub fn first_pages_text(bytes: &[u8]) -> Option<String> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    let pages = match result {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            tracing::debug!("PDF text extraction failed: {}", e);
            return None;
        }
        Err(_) => {
            tracing::warn!("PDF text extraction panicked");
            return None;
        }
    };

    let text = pages
        .iter()
        .take(TEXT_PAGES)
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(text)
}

/// Runs the PDF date strategies in order and returns the first date found
pub fn pdf_published_date(source: &PdfSource<'_>, locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    PDF_DATE_STRATEGIES.iter().find_map(|(name, strategy)| {
        let date = strategy(source, locale)?;
        tracing::trace!("PDF date {} from {}", date, name);
        Some(date)
    })
}

/// Title of a PDF: the last path segment of its URL
pub fn pdf_title(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let after_host = path
        .split_once("://")
        .map_or(path, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));
    after_host
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map_or_else(|| "PDF".to_string(), str::to_string)
}

fn first_capture_date(re: &BytesRegex, bytes: &[u8]) -> Option<NaiveDate> {
    re.captures_iter(bytes).find_map(|caps| {
        let raw = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
        parse_date_value(raw)
    })
}

// The raw byte scans cover files lopdf rejects (broken xref tables)
fn info_creation_date(source: &PdfSource<'_>, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    source
        .info
        .creation_date
        .or_else(|| first_capture_date(&CREATION_DATE_RE, source.bytes))
}

fn info_mod_date(source: &PdfSource<'_>, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    source
        .info
        .mod_date
        .or_else(|| first_capture_date(&MOD_DATE_RE, source.bytes))
}

fn xmp_create_date(source: &PdfSource<'_>, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    first_capture_date(&XMP_CREATE_DATE_RE, source.bytes)
}

fn text_date(source: &PdfSource<'_>, locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    locale
        .find_long_date(source.text)
        .and_then(plausible)
        .or_else(|| numeric_date_in_text(source.text))
}

fn filename_date(source: &PdfSource<'_>, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    date_in_filename(source.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::locale::SwedishLocale;
    use lopdf::{dictionary, encode_utf16_be, StringFormat};

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn detect(url: &str, bytes: &[u8], text: &str) -> Option<NaiveDate> {
        let info = PdfInfo::read(bytes);
        pdf_published_date(&PdfSource { url, bytes, text, info: &info }, &SwedishLocale)
    }

    /// A one-page PDF whose info dictionary holds `info`
    fn pdf_with_info(info: Dictionary) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(info);
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_info_dictionary_utf16_date() {
        let bytes = pdf_with_info(dictionary! {
            "CreationDate" => Object::String(
                encode_utf16_be("D:20230415090000+02'00'"),
                StringFormat::Hexadecimal,
            ),
        });
        // Hex strings are invisible to a scan of the raw bytes
        assert!(first_capture_date(&CREATION_DATE_RE, &bytes).is_none());

        let info = PdfInfo::read(&bytes);
        assert_eq!(info.creation_date, date(2023, 4, 15));
        assert_eq!(info.mod_date, None);
        assert_eq!(detect("https://example.se/arsredovisning.pdf", &bytes, ""), date(2023, 4, 15));
    }

    #[test]
    fn test_info_dictionary_mod_date_literal() {
        let bytes = pdf_with_info(dictionary! {
            "ModDate" => Object::string_literal("D:20240102"),
        });
        assert_eq!(PdfInfo::read(&bytes).mod_date, date(2024, 1, 2));
    }

    #[test]
    fn test_info_of_garbage_is_empty() {
        assert_eq!(PdfInfo::read(b"not a pdf at all"), PdfInfo::default());
    }

    #[test]
    fn test_creation_date_first() {
        let bytes = b"%PDF-1.4\n<< /ModDate (D:20240301120000) /CreationDate (D:20240215093000+01'00') >>";
        assert_eq!(
            detect("https://example.se/q4-2023-12-31.pdf", bytes, "1 januari 2020"),
            date(2024, 2, 15)
        );
    }

    #[test]
    fn test_mod_date_when_no_creation_date() {
        let bytes = b"<< /ModDate(D:20231103) >>";
        assert_eq!(detect("https://example.se/a.pdf", bytes, ""), date(2023, 11, 3));
    }

    #[test]
    fn test_xmp_create_date() {
        let bytes = b"<x:xmpmeta><xmp:CreateDate>2022-08-19T10:00:00Z</xmp:CreateDate></x:xmpmeta>";
        assert_eq!(detect("https://example.se/a.pdf", bytes, ""), date(2022, 8, 19));
    }

    #[test]
    fn test_text_then_filename() {
        assert_eq!(
            detect("https://example.se/r_2021_01_02.pdf", b"", "Delårsrapport 25 april 2024"),
            date(2024, 4, 25)
        );
        assert_eq!(
            detect("https://example.se/r_2021_01_02.pdf", b"", "Ingen datering"),
            date(2021, 1, 2)
        );
        assert_eq!(detect("https://example.se/r.pdf", b"", ""), None);
    }

    #[test]
    fn test_invalid_pdf_yields_none() {
        assert_eq!(first_pages_text(b"not a pdf at all"), None);
    }

    #[test]
    fn test_pdf_title() {
        assert_eq!(pdf_title("https://example.se/files/q1-2024.pdf?v=3"), "q1-2024.pdf");
        assert_eq!(pdf_title("https://example.se/files/"), "files");
        assert_eq!(pdf_title("https://example.se/"), "PDF");
    }
}
