use crate::crawler::TlsPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// User agent token sent with every request and matched against robots.txt
pub const DEFAULT_USER_AGENT: &str = "listedinc-crawler/0.1";

/// Main configuration structure
///
/// Every section and field is optional in the TOML file; CLI flags are
/// applied on top of the loaded values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub http: HttpConfig,
    pub filters: FilterConfig,
    pub discovery: DiscoveryConfig,
    pub storage: StorageConfig,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Start URL of the crawl (usually given on the command line)
    #[serde(rename = "start-url")]
    pub start_url: Option<String>,

    /// Maximum number of successfully ingested URLs, start URL included
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum link depth from the start URL (start URL is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Pause after every fetch (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Maximum number of links taken from a single page
    #[serde(rename = "max-links")]
    pub max_links: usize,

    /// Seed the frontier from /sitemap.xml
    #[serde(rename = "use-sitemap")]
    pub use_sitemap: bool,

    /// Follow links to hosts other than the start host and discovered IR hosts
    #[serde(rename = "allow-external")]
    pub allow_external: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: None,
            max_pages: 60,
            max_depth: 3,
            delay_ms: 300,
            max_links: 1000,
            use_sitemap: false,
            allow_external: false,
        }
    }
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Attempts per fetch, including the first one
    pub retries: u32,

    /// Base of the exponential backoff between attempts (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Disable TLS certificate verification
    pub insecure: bool,

    /// PEM bundle with extra trusted root certificates
    #[serde(rename = "ca-bundle")]
    pub ca_bundle: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            retries: 3,
            backoff_base_ms: 1000,
            insecure: false,
            ca_bundle: None,
        }
    }
}

impl HttpConfig {
    /// TLS policy implied by the `insecure` and `ca-bundle` settings
    ///
    /// `insecure` wins when both are set.
    pub fn tls_policy(&self) -> TlsPolicy {
        if self.insecure {
            TlsPolicy::Insecure
        } else if let Some(path) = &self.ca_bundle {
            TlsPolicy::CustomCa(path.clone())
        } else {
            TlsPolicy::Verify
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// URL filter configuration (all patterns are case-insensitive regexes)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// A URL must match at least one of these when any are given
    pub include: Vec<String>,

    /// A URL matching any of these is skipped
    pub exclude: Vec<String>,

    /// When given, the URL host must match at least one of these
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,
}

/// Seed discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Look for investor-relations hosts (investor.*, ir.*, ...) and seed them
    #[serde(rename = "discover-ir-hosts")]
    pub discover_ir_hosts: bool,

    /// Maximum number of discovered IR hosts
    #[serde(rename = "ir-host-limit")]
    pub ir_host_limit: usize,

    /// Seed well-known IR and press paths on the start host
    #[serde(rename = "auto-seed")]
    pub auto_seed: bool,

    /// Auto-seeded paths bypass the include/exclude filters
    #[serde(rename = "seed-ignore-filters")]
    pub seed_ignore_filters: bool,

    /// Switch the start URL to investor.<domain> when that host answers
    #[serde(rename = "investor-probe")]
    pub investor_probe: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discover_ir_hosts: false,
            ir_host_limit: 5,
            auto_seed: false,
            seed_ignore_filters: false,
            investor_probe: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Connection string; DATABASE_URL or --database-url take precedence
    #[serde(rename = "database-url")]
    pub database_url: Option<String>,

    /// Persist raw PDF bytes in the content-addressed blob store
    #[serde(rename = "pdf-to-db")]
    pub pdf_to_db: bool,
}
