//! HTML text, title, heading and tag extraction

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Elements that end a line of visible text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements whose content is never visible text
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template", "svg"];

/// A parsed HTML page plus its visible text split into lines
///
/// Lines follow block structure, so a heading, a paragraph and a table cell
/// each end up on their own line. Whitespace inside a line is collapsed.
pub struct PageView {
    document: Html,
    lines: Vec<String>,
}

impl PageView {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut lines = Vec::new();
        let mut current = String::new();
        collect_lines(document.root_element(), &mut current, &mut lines);
        flush_line(&mut current, &mut lines);
        Self { document, lines }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn visible_text(&self) -> String {
        self.lines.join("\n")
    }

    /// Every JSON-LD block on the page that parses as JSON
    pub fn json_ld(&self) -> Vec<Value> {
        let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return Vec::new();
        };
        self.document
            .select(&selector)
            .filter_map(|script| {
                let raw: String = script.text().collect();
                match serde_json::from_str(raw.trim()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::trace!("Ignoring malformed JSON-LD: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

fn collect_lines(element: ElementRef<'_>, current: &mut String, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                flush_line(current, lines);
            }
            collect_lines(child_element, current, lines);
            if block {
                flush_line(current, lines);
            }
        } else if let Some(text) = child.value().as_text() {
            current.push_str(text);
        }
    }
}

fn flush_line(current: &mut String, lines: &mut Vec<String>) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Main text and title through a readability pass
///
/// Falls back to the page's visible text when readability fails or finds no
/// text, and to the `<title>` element when it finds no title.
pub fn main_text_and_title(html: &str, url: &str, page: &PageView) -> (String, Option<String>) {
    let product = Url::parse(url)
        .ok()
        .and_then(|parsed| match readability::extractor::extract(&mut html.as_bytes(), &parsed) {
            Ok(product) => Some(product),
            Err(e) => {
                tracing::debug!("Readability failed for {}: {}", url, e);
                None
            }
        });

    let (text, title) = match product {
        Some(product) => (
            tidy_text(&product.text),
            Some(collapse_whitespace(&product.title)),
        ),
        None => (String::new(), None),
    };

    let text = if text.is_empty() {
        page.visible_text()
    } else {
        text
    };
    let title = title
        .filter(|t| !t.is_empty())
        .or_else(|| page_title(page.document()));

    (text, title)
}

/// Collapses whitespace per line and drops empty lines
fn tidy_text(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the `<title>` element
pub fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Text of every `h1` and `h2`, in document order
pub fn extract_headings(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("h1, h2") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|heading| collapse_whitespace(&heading.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Tags from meta keywords, `rel="tag"` links and JSON-LD keywords
///
/// Sources are read in that order; duplicates are dropped case-insensitively
/// keeping the first spelling.
pub fn extract_tags(page: &PageView) -> Vec<String> {
    let mut tags = Vec::new();

    if let Ok(selector) = Selector::parse(r#"meta[name="keywords" i]"#) {
        for meta in page.document().select(&selector) {
            if let Some(content) = meta.value().attr("content") {
                tags.extend(split_keywords(content));
            }
        }
    }

    if let Ok(selector) = Selector::parse(r#"a[rel~="tag"]"#) {
        for link in page.document().select(&selector) {
            tags.push(collapse_whitespace(&link.text().collect::<String>()));
        }
    }

    for value in page.json_ld() {
        let mut keywords = Vec::new();
        collect_json_key(&value, "keywords", &mut keywords);
        for keyword in keywords {
            match keyword {
                Value::String(s) => tags.extend(split_keywords(s)),
                Value::Array(items) => tags.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(collapse_whitespace),
                ),
                _ => {}
            }
        }
    }

    let mut seen = HashSet::new();
    tags.retain(|tag| !tag.is_empty() && seen.insert(tag.to_lowercase()));
    tags
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collects every value stored under `key`, searching nested objects and arrays
pub(crate) fn collect_json_key<'v>(value: &'v Value, key: &str, out: &mut Vec<&'v Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    out.push(v);
                } else {
                    collect_json_key(v, key, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_key(item, key, out);
            }
        }
        _ => {}
    }
}
