//! URL handling module
//!
//! This module provides URL canonicalization (the crawl identity of a page)
//! and host helpers used by the same-site check, seed discovery and the
//! start-URL fallback.

mod domain;
mod normalize;

pub use domain::{extract_domain, host_of, origin_root, same_site, strip_www, toggle_www};
pub use normalize::{canonical_url, canonicalize, ensure_scheme};

/// File extensions treated as binary assets that are never crawled
pub const SKIPPED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".zip", ".gz", ".tar", ".7z", ".mp4",
    ".mp3", ".mov",
];

/// Returns the lower-cased path of a URL string, ignoring query and fragment
fn lowercase_path(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_lowercase()
}

/// Returns true if the URL path ends with `.pdf`
pub fn is_pdf_url(url: &str) -> bool {
    lowercase_path(url).ends_with(".pdf")
}

/// Returns true if the URL path ends with a binary asset extension
pub fn has_skipped_extension(url: &str) -> bool {
    let path = lowercase_path(url);
    SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_url() {
        assert!(is_pdf_url("https://example.com/q1.pdf"));
        assert!(is_pdf_url("https://example.com/Q1.PDF?download=1"));
        assert!(!is_pdf_url("https://example.com/pdf"));
        assert!(!is_pdf_url("https://example.com/list?file=a.pdf.html"));
    }

    #[test]
    fn test_has_skipped_extension() {
        assert!(has_skipped_extension("https://example.com/logo.PNG"));
        assert!(has_skipped_extension("https://example.com/archive.tar"));
        assert!(!has_skipped_extension("https://example.com/report.pdf"));
        assert!(!has_skipped_extension("https://example.com/page"));
    }
}
