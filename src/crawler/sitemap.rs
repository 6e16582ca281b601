//! Sitemap reader
//!
//! Reads `/sitemap.xml` from the start host. A sitemap index is expanded one
//! level deep; indexes nested inside indexes are not followed.

use crate::crawler::Fetcher;
use crate::url::{canonicalize, has_skipped_extension};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use url::Url;

/// Timeout for every sitemap request
const SITEMAP_TIMEOUT: Duration = Duration::from_secs(15);

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page locations
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: locations of further sitemaps
    Index(Vec<String>),
}

/// Parses sitemap XML
///
/// Elements are matched by local name, so both namespaced and plain
/// sitemaps are accepted.
///
/// # Returns
///
/// * `Some(SitemapDocument)` - A `<urlset>` or `<sitemapindex>` document
/// * `None` - Malformed XML or an unknown root element
pub fn parse_sitemap(xml: &str) -> Option<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    let mut pages = Vec::new();
    let mut nested = Vec::new();

    loop {
        let text = match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if root.is_none() {
                    root = Some(name.clone());
                }
                path.push(name);
                continue;
            }
            Ok(Event::End(_)) => {
                path.pop();
                continue;
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(text) => text.into_owned(),
                Err(e) => {
                    tracing::debug!("Bad text in sitemap: {}", e);
                    return None;
                }
            },
            Ok(Event::CData(c)) => String::from_utf8_lossy(&c).into_owned(),
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(
                    "Sitemap XML error at position {}: {}",
                    reader.error_position(),
                    e
                );
                return None;
            }
        };

        let loc = text.trim();
        if loc.is_empty() || path.last().map(String::as_str) != Some("loc") {
            continue;
        }
        match path.len().checked_sub(2).and_then(|i| path.get(i)).map(String::as_str) {
            Some("url") => pages.push(loc.to_string()),
            Some("sitemap") => nested.push(loc.to_string()),
            _ => {}
        }
    }

    match root.as_deref() {
        Some("urlset") => Some(SitemapDocument::UrlSet(pages)),
        Some("sitemapindex") => Some(SitemapDocument::Index(nested)),
        _ => None,
    }
}

/// Fetches `/sitemap.xml` of the start host and returns the page locations
///
/// For a sitemap index every nested sitemap is fetched once (one attempt,
/// no recursion) and the page locations are flattened in index order.
/// A failing nested sitemap contributes nothing; partial results are kept.
/// Every failure of the root sitemap yields an empty list.
///
/// # Arguments
///
/// * `fetcher` - The HTTP fetcher
/// * `start_url` - Any URL on the host whose sitemap should be read
pub async fn fetch_sitemap(fetcher: &Fetcher, start_url: &str) -> Vec<String> {
    let Ok(mut sitemap_url) = Url::parse(start_url) else {
        return Vec::new();
    };
    sitemap_url.set_path("/sitemap.xml");
    sitemap_url.set_query(None);
    sitemap_url.set_fragment(None);

    match fetch_document(fetcher, sitemap_url.as_str()).await {
        Some(SitemapDocument::UrlSet(pages)) => {
            tracing::debug!("Sitemap {} lists {} pages", sitemap_url, pages.len());
            pages
        }
        Some(SitemapDocument::Index(nested)) => {
            tracing::debug!("Sitemap index {} lists {} sitemaps", sitemap_url, nested.len());
            let mut pages = Vec::new();
            for nested_url in nested {
                match fetch_document(fetcher, &nested_url).await {
                    Some(SitemapDocument::UrlSet(found)) => pages.extend(found),
                    Some(SitemapDocument::Index(_)) => {
                        tracing::debug!("Skipping nested sitemap index {}", nested_url);
                    }
                    None => {}
                }
            }
            pages
        }
        None => Vec::new(),
    }
}

/// Canonicalizes sitemap locations for the frontier
///
/// Invalid locations and binary assets (images, media, archives) are
/// dropped the same way page links are; PDFs are kept.
pub fn sitemap_links(locations: &[String]) -> Vec<String> {
    locations
        .iter()
        .filter_map(|loc| canonicalize(loc, None))
        .filter(|url| !has_skipped_extension(url))
        .collect()
}

async fn fetch_document(fetcher: &Fetcher, url: &str) -> Option<SitemapDocument> {
    match fetcher.fetch_once(url, SITEMAP_TIMEOUT).await {
        Ok(result) if result.is_success() => parse_sitemap(&result.text()),
        Ok(result) => {
            tracing::debug!("Sitemap {} returned status {}", url, result.status_code);
            None
        }
        Err(e) => {
            tracing::debug!("Sitemap fetch failed for {}: {}", url, e);
            None
        }
    }
}
