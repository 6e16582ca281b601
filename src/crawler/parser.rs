//! HTML link extraction
//!
//! This module parses fetched HTML and returns the links worth following.

use crate::url::{canonicalize, has_skipped_extension};
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Default cap on links taken from a single page
pub const DEFAULT_MAX_LINKS: usize = 1000;

/// Extracts followable links from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` targets, canonicalized against the page URL
/// - `.pdf` documents
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` targets
/// - Fragment-only links (same page anchors)
/// - Non-HTTP(S) URLs after resolution
/// - Binary assets (images, archives, audio, video)
///
/// Links are returned in document order without duplicates and capped at
/// `max_links`.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL of the page, used to resolve relative links
/// * `max_links` - Maximum number of links to return
///
/// # Example
///
/// ```
/// use listedinc_crawler::crawler::extract_links;
///
/// let html = r#"<a href="/ir/">IR</a><a href="logo.png">Logo</a>"#;
/// let links = extract_links(html, "https://example.se/", 100);
/// assert_eq!(links, vec!["https://example.se/ir".to_string()]);
/// ```
pub fn extract_links(html: &str, page_url: &str, max_links: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        if links.len() >= max_links {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = resolve_link(href, page_url) else {
            continue;
        };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

/// Resolves a link href to a canonical absolute URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, page_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let link = canonicalize(href, Some(page_url))?;
    if has_skipped_extension(&link) {
        return None;
    }
    Some(link)
}
