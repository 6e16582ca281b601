//! Seed discovery
//!
//! Heuristics that add starting points beyond the start URL:
//! - well-known IR and press paths on the start host
//! - investor-relations hosts (`investor.`, `ir.`, ...) of the same company
//! - an `investor.<domain>` start URL when that host answers

use crate::crawler::parser::extract_links;
use crate::crawler::sitemap::fetch_sitemap;
use crate::crawler::Fetcher;
use crate::url::{canonicalize, host_of, strip_www};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Paths commonly used for IR, press and report pages (Swedish and English)
pub const WELL_KNOWN_PATHS: &[&str] = &[
    "",
    "/press",
    "/nyhet",
    "/nyheter",
    "/nyheter-och-press",
    "/pressmeddelanden",
    "/investerare",
    "/investors",
    "/ir",
    "/financial-reports",
    "/reports",
    "/rapporter",
    "/rapporter-och-presentationer",
    "/media",
    "/news",
    "/press-releases",
    "/annual-report",
    "/delarsrapport",
    "/delarsrapporter",
    "/arsredovisning",
    "/pdf",
    "/dokument",
    "/documents",
];

/// Subdomain prefixes always probed during IR host discovery
const PROBED_PREFIXES: &[&str] = &["investor", "ir", "financial"];

/// Cap on links read from the start page during IR host discovery
const DISCOVERY_MAX_LINKS: usize = 2000;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

static IR_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(invest(or|ors)?|ir|financial|finance|reports?|news|press|corporate)\.")
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// Returns true if a host name looks like an investor-relations host
pub fn is_ir_host(host: &str) -> bool {
    IR_HOST_RE.is_match(host)
}

/// Well-known seed URLs on the origin of `start`
///
/// Candidates are canonicalized and de-duplicated, keeping list order.
pub fn well_known_seeds(start: &str) -> Vec<String> {
    let Ok(start_url) = Url::parse(start) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    WELL_KNOWN_PATHS
        .iter()
        .filter_map(|path| {
            let mut candidate = start_url.clone();
            candidate.set_path(if path.is_empty() { "/" } else { path });
            candidate.set_query(None);
            canonicalize(candidate.as_str(), None)
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Discovers reachable investor-relations hosts of the start URL's company
///
/// Candidate hosts come from links on the start page and the sitemap (hosts
/// matching the IR host pattern, other than the base host and its `www.`
/// variant) plus `investor.`, `ir.` and `financial.` on the base host. Each
/// candidate root is probed once and kept when it answers below 400. Probing
/// stops after `limit` reachable hosts.
///
/// # Returns
///
/// Root URLs (`<scheme>://<host>/`) of the reachable hosts, in discovery order
pub async fn discover_ir_hosts(fetcher: &Fetcher, start: &str, limit: usize) -> Vec<String> {
    let Ok(start_url) = Url::parse(start) else {
        return Vec::new();
    };
    let Some(host) = start_url.host_str().map(str::to_lowercase) else {
        return Vec::new();
    };
    let base = strip_www(&host).to_string();
    let www = format!("www.{}", base);

    let mut found_links = Vec::new();
    match fetcher.fetch_once(start, DISCOVERY_TIMEOUT).await {
        Ok(result) if result.is_success() => {
            found_links.extend(extract_links(&result.text(), start, DISCOVERY_MAX_LINKS));
        }
        Ok(result) => {
            tracing::debug!("IR discovery: start page returned {}", result.status_code);
        }
        Err(e) => tracing::debug!("IR discovery: start page failed: {}", e),
    }
    found_links.extend(fetch_sitemap(fetcher, start).await);

    let mut candidates: Vec<String> = Vec::new();
    for candidate in found_links.iter().filter_map(|link| host_of(link)) {
        if candidate != base && candidate != www && is_ir_host(&candidate) {
            candidates.push(candidate);
        }
    }
    for prefix in PROBED_PREFIXES {
        candidates.push(format!("{}.{}", prefix, base));
    }

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    tracing::debug!("IR host candidates: {:?}", candidates);

    let mut reachable = Vec::new();
    for candidate in candidates {
        if reachable.len() >= limit {
            break;
        }
        let root = format!("{}://{}/", start_url.scheme(), with_port(&candidate, &start_url));
        if probe(fetcher, &root).await {
            tracing::info!("Discovered IR host {}", candidate);
            reachable.push(root);
        }
    }
    reachable
}

/// Probes `investor.<domain>` for a start URL on the main site
///
/// Returns the investor root URL when the start host does not already begin
/// with `investor.` and the investor host answers below 400.
pub async fn guess_investor_start(fetcher: &Fetcher, start: &str) -> Option<String> {
    let start_url = Url::parse(start).ok()?;
    let host = start_url.host_str()?.to_lowercase();
    if host.starts_with("investor.") {
        return None;
    }

    let investor_host = format!("investor.{}", strip_www(&host));
    let root = format!(
        "{}://{}/",
        start_url.scheme(),
        with_port(&investor_host, &start_url)
    );
    if probe(fetcher, &root).await {
        Some(root)
    } else {
        None
    }
}

/// One request, short timeout; true when the host answers below 400
async fn probe(fetcher: &Fetcher, url: &str) -> bool {
    match fetcher.fetch_once(url, PROBE_TIMEOUT).await {
        Ok(result) => {
            tracing::debug!("Probe {} -> {}", url, result.status_code);
            result.is_success()
        }
        Err(e) => {
            tracing::debug!("Probe {} failed: {}", url, e);
            false
        }
    }
}

fn with_port(host: &str, like: &Url) -> String {
    match like.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
