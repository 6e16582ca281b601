//! Robots.txt handling module
//!
//! Robots rules are fetched once per crawl for the start host and held by a
//! read-only [`PolitenessGate`] inside the crawl session. A missing or
//! unreadable robots.txt allows everything.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use std::time::Duration;
use url::Url;

/// Timeout for the single robots.txt request
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches robots.txt for the host of `start_url`
///
/// Best effort: one attempt, no retries. Transport errors, statuses >= 400
/// and empty bodies all yield `None`.
///
/// # Arguments
///
/// * `fetcher` - The HTTP fetcher
/// * `start_url` - Any URL on the host whose robots.txt should be read
pub async fn fetch_robots(fetcher: &Fetcher, start_url: &str) -> Option<ParsedRobots> {
    let mut robots_url = Url::parse(start_url).ok()?;
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    match fetcher.fetch_once(robots_url.as_str(), ROBOTS_TIMEOUT).await {
        Ok(result) if result.is_success() => {
            let content = result.text();
            if content.trim().is_empty() {
                tracing::debug!("Empty robots.txt at {}", robots_url);
                None
            } else {
                tracing::debug!("Loaded robots.txt from {}", robots_url);
                Some(ParsedRobots::from_content(&content))
            }
        }
        Ok(result) => {
            tracing::debug!(
                "No robots.txt at {} (status {})",
                robots_url,
                result.status_code
            );
            None
        }
        Err(e) => {
            tracing::debug!("robots.txt fetch failed for {}: {}", robots_url, e);
            None
        }
    }
}

/// Read-only robots.txt decision for one crawl
#[derive(Debug, Clone)]
pub struct PolitenessGate {
    robots: Option<ParsedRobots>,
    user_agent: String,
}

impl PolitenessGate {
    pub fn new(robots: Option<ParsedRobots>, user_agent: impl Into<String>) -> Self {
        Self {
            robots,
            user_agent: user_agent.into(),
        }
    }

    /// A gate that allows everything
    pub fn allow_all(user_agent: impl Into<String>) -> Self {
        Self::new(None, user_agent)
    }

    /// Checks if a URL is allowed; absent rules allow everything
    pub fn allowed(&self, url: &str) -> bool {
        self.robots
            .as_ref()
            .map_or(true, |robots| robots.is_allowed(url, &self.user_agent))
    }

    /// Robots `Crawl-delay` for our user agent
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.robots
            .as_ref()
            .and_then(|robots| robots.crawl_delay(&self.user_agent))
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn has_rules(&self) -> bool {
        self.robots.is_some()
    }
}
