//! Pre-fetch checks
//!
//! Every task popped from the frontier passes these checks, in order, before
//! it is fetched. The first failing check skips the task.

use crate::config::{compile_patterns, FilterConfig};
use crate::crawler::frontier::CrawlTask;
use crate::robots::PolitenessGate;
use crate::url::host_of;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Why a task was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Host is neither the start host nor a discovered IR host
    External,
    /// Disallowed by robots.txt
    Robots,
    /// Rejected by the include/exclude patterns
    Filtered,
    /// Host rejected by the allowed-hosts patterns
    HostNotAllowed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::External => "external",
            Self::Robots => "robots",
            Self::Filtered => "filter",
            Self::HostNotAllowed => "host",
        };
        f.write_str(label)
    }
}

/// Ordered pre-fetch checks for one crawl
#[derive(Debug)]
pub struct CrawlFilter {
    site_hosts: HashSet<String>,
    allow_external: bool,
    gate: PolitenessGate,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    allowed_hosts: Vec<Regex>,
}

impl CrawlFilter {
    /// Creates the filter for a crawl
    ///
    /// # Arguments
    ///
    /// * `start_url` - The (final) start URL; its host is the crawl's site
    /// * `filters` - Include, exclude and allowed-host patterns
    /// * `allow_external` - Disable the same-site check
    /// * `gate` - Robots rules of the start host
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlFilter)` - All patterns compiled
    /// * `Err(ConfigError)` - A pattern is not a valid regex
    pub fn new(
        start_url: &str,
        filters: &FilterConfig,
        allow_external: bool,
        gate: PolitenessGate,
    ) -> Result<Self, ConfigError> {
        let mut site_hosts = HashSet::new();
        if let Some(host) = host_of(start_url) {
            site_hosts.insert(host);
        }

        Ok(Self {
            site_hosts,
            allow_external,
            gate,
            include: compile_patterns(&filters.include)?,
            exclude: compile_patterns(&filters.exclude)?,
            allowed_hosts: compile_patterns(&filters.allowed_hosts)?,
        })
    }

    /// Treats another host (a discovered IR host) as part of the site
    pub fn add_site_host(&mut self, url: &str) {
        if let Some(host) = host_of(url) {
            self.site_hosts.insert(host);
        }
    }

    pub fn gate(&self) -> &PolitenessGate {
        &self.gate
    }

    /// Runs all checks for a task
    pub fn check(&self, task: &CrawlTask) -> Result<(), SkipReason> {
        self.check_url(&task.url, task.bypass_filters)
    }

    /// Runs all checks for a URL
    ///
    /// # Check Order
    ///
    /// 1. Same site (skipped when external links are allowed)
    /// 2. robots.txt
    /// 3. Include/exclude patterns (skipped when `bypass_filters` is set)
    /// 4. Allowed-host patterns
    pub fn check_url(&self, url: &str, bypass_filters: bool) -> Result<(), SkipReason> {
        if !self.allow_external && !self.is_site_url(url) {
            return Err(SkipReason::External);
        }
        if !self.gate.allowed(url) {
            return Err(SkipReason::Robots);
        }
        if !bypass_filters && !self.passes_patterns(url) {
            return Err(SkipReason::Filtered);
        }
        if !self.host_allowed(url) {
            return Err(SkipReason::HostNotAllowed);
        }
        Ok(())
    }

    fn is_site_url(&self, url: &str) -> bool {
        host_of(url).map_or(false, |host| self.site_hosts.contains(&host))
    }

    /// Include: at least one must match when any are given. Exclude: none may match.
    pub fn passes_patterns(&self, url: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(url)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(url))
    }

    fn host_allowed(&self, url: &str) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        host_of(url).map_or(false, |host| {
            self.allowed_hosts.iter().any(|re| re.is_match(&host))
        })
    }
}
