//! Publication date detection
//!
//! HTML pages run through an ordered list of strategies; the first one that
//! yields a plausible date wins. Numeric and filename parsing is shared with
//! the PDF path.

use crate::extract::html::{collect_json_key, PageView};
use crate::extract::locale::LocalePolicy;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

/// A single date heuristic over a parsed page
pub type HtmlDateStrategy = fn(&PageView, &dyn LocalePolicy) -> Option<NaiveDate>;

/// HTML date strategies, in priority order
pub const HTML_DATE_STRATEGIES: &[(&str, HtmlDateStrategy)] = &[
    ("article:published_time", published_time_meta),
    ("date meta", date_meta),
    ("time element", time_element),
    ("json-ld", json_ld_date),
    ("long-form text", long_form_text_date),
    ("numeric text", numeric_text_date),
];

/// `<meta name|property>` values that carry a publication date
const DATE_META_NAMES: &[&str] = &[
    "pubdate",
    "publishdate",
    "publish-date",
    "date",
    "dc.date",
    "dc.date.issued",
    "dcterms.created",
    "dcterms.date",
    "og:published_time",
    "datepublished",
    "article:modified_time",
];

/// JSON-LD keys, in priority order
const JSON_LD_DATE_KEYS: &[&str] = &["datePublished", "dateCreated", "uploadDate", "dateModified"];

static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b").unwrap());

/// Patterns for dates in filenames, in priority order
static FILENAME_DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // 2024-03-12, 2024_03_12
        Regex::new(r"(\d{4})[-_.](\d{2})[-_.](\d{2})").unwrap(),
        // 20240312
        Regex::new(r"(?:^|[^\d])(\d{4})(\d{2})(\d{2})(?:[^\d]|$)").unwrap(),
    ]
});

/// Runs the HTML strategies in order and returns the first date found
pub fn html_published_date(page: &PageView, locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    HTML_DATE_STRATEGIES.iter().find_map(|(name, strategy)| {
        let date = strategy(page, locale)?;
        tracing::trace!("Published date {} from {}", date, name);
        Some(date)
    })
}

/// Parses a date attribute or metadata value
///
/// Accepts RFC 3339 timestamps and `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`
/// or `YYYYMMDD` prefixes. Implausible years are rejected.
pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return plausible(dt.date_naive());
    }

    let prefix: String = value.chars().take(10).collect();
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(&prefix, format) {
            return plausible(date);
        }
    }

    let compact: String = value.chars().take(8).collect();
    if compact.len() == 8 && compact.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(&compact, "%Y%m%d") {
            return plausible(date);
        }
    }

    None
}

/// First `YYYY-MM-DD`-style date in free text
pub fn numeric_date_in_text(text: &str) -> Option<NaiveDate> {
    NUMERIC_DATE_RE
        .captures_iter(text)
        .find_map(|caps| ymd(&caps[1], &caps[2], &caps[3]))
}

/// Date embedded in the last path segment of a URL
pub fn date_in_filename(url: &str) -> Option<NaiveDate> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let filename = path.rsplit('/').next().unwrap_or(path);

    FILENAME_DATE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(filename)
            .find_map(|caps| ymd(&caps[1], &caps[2], &caps[3]))
    })
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    plausible(date)
}

/// Rejects dates before 1900 or more than a year in the future
pub(crate) fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    let max_year = Utc::now().year() + 1;
    (1900..=max_year).contains(&date.year()).then_some(date)
}

fn meta_content(page: &PageView, names: &[&str]) -> Option<NaiveDate> {
    let selector = Selector::parse("meta[content]").ok()?;
    let metas: Vec<_> = page.document().select(&selector).collect();

    // Name order decides priority, not document order
    names.iter().find_map(|wanted| {
        metas.iter().find_map(|meta| {
            let element = meta.value();
            let key = element
                .attr("property")
                .or_else(|| element.attr("name"))
                .or_else(|| element.attr("itemprop"))?;
            if !key.eq_ignore_ascii_case(wanted) {
                return None;
            }
            parse_date_value(element.attr("content")?)
        })
    })
}

fn published_time_meta(page: &PageView, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    meta_content(page, &["article:published_time"])
}

fn date_meta(page: &PageView, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    meta_content(page, DATE_META_NAMES)
}

fn time_element(page: &PageView, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    let selector = Selector::parse("time").ok()?;
    page.document().select(&selector).find_map(|time| {
        time.value()
            .attr("datetime")
            .and_then(parse_date_value)
            .or_else(|| parse_date_value(&time.text().collect::<String>()))
    })
}

fn json_ld_date(page: &PageView, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    let blocks = page.json_ld();
    JSON_LD_DATE_KEYS.iter().find_map(|key| {
        blocks.iter().find_map(|block| {
            let mut values = Vec::new();
            collect_json_key(block, key, &mut values);
            values
                .into_iter()
                .find_map(|value| value.as_str().and_then(parse_date_value))
        })
    })
}

fn long_form_text_date(page: &PageView, locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    page.lines()
        .iter()
        .find_map(|line| locale.find_long_date(line))
        .and_then(plausible)
}

fn numeric_text_date(page: &PageView, _locale: &dyn LocalePolicy) -> Option<NaiveDate> {
    page.lines().iter().find_map(|line| numeric_date_in_text(line))
}
