//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl session that ties all components together:
//! - Resolving the start URL (investor probe, www fallback)
//! - Seeding the frontier from IR hosts, well-known paths and the sitemap
//! - The fetch → check → ingest → extract-links loop
//! - Per-run counters reported at the end

use crate::config::{validate, Config};
use crate::crawler::filter::{CrawlFilter, SkipReason};
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::crawler::parser::extract_links;
use crate::crawler::seeds::{discover_ir_hosts, guess_investor_start, well_known_seeds};
use crate::crawler::sitemap::{fetch_sitemap, sitemap_links};
use crate::crawler::{FetchResult, Fetcher};
use crate::extract::{DocumentKind, MetadataExtractor};
use crate::ingest::{ChangeKind, IngestOutcome, Ingestor};
use crate::robots::{fetch_robots, PolitenessGate};
use crate::storage::{open_storage, SqliteStorage, Storage};
use crate::url::{canonicalize, host_of, toggle_www};
use crate::{ConfigError, CrawlError};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// The start URL actually crawled (after probe and www fallback)
    pub start_url: String,
    /// Responses recorded in the store, start URL included
    pub ingested: u32,
    pub new_documents: u32,
    pub changed_documents: u32,
    pub unchanged: u32,
    pub error_status: u32,
    /// Fetch or store failures (logged and skipped)
    pub failed: u32,
    pub skipped: HashMap<SkipReason, u32>,
}

impl CrawlReport {
    fn record(&mut self, outcome: &IngestOutcome) {
        self.ingested += 1;
        match outcome.change {
            ChangeKind::New => self.new_documents += 1,
            ChangeKind::Changed => self.changed_documents += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
            ChangeKind::ErrorStatus => self.error_status += 1,
        }
    }

    /// Number of tasks skipped for `reason`
    pub fn skipped_for(&self, reason: SkipReason) -> u32 {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> u32 {
        self.skipped.values().sum()
    }
}

/// Main crawler coordinator structure
///
/// Owns everything a crawl needs: fetcher, ingestor and frontier. The
/// pre-fetch filter is built once the start host is known.
pub struct Coordinator<S: Storage> {
    config: Config,
    fetcher: Fetcher,
    ingestor: Ingestor<S>,
    frontier: Frontier,
    report: CrawlReport,
}

impl<S: Storage> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration; `crawler.start-url` must be set
    /// * `storage` - The store responses are ingested into
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Invalid configuration or HTTP client setup failed
    pub fn new(config: Config, storage: S) -> Result<Self, CrawlError> {
        validate(&config)?;
        if config.crawler.start_url.is_none() {
            return Err(ConfigError::Validation("no start URL given".to_string()).into());
        }

        let fetcher = Fetcher::from_config(&config.http)?;
        let ingestor = Ingestor::new(
            storage,
            MetadataExtractor::default(),
            config.storage.pdf_to_db,
        );
        let frontier = Frontier::new(config.crawler.max_depth);

        Ok(Self {
            config,
            fetcher,
            ingestor,
            frontier,
            report: CrawlReport::default(),
        })
    }

    pub fn storage(&self) -> &S {
        self.ingestor.storage()
    }

    /// Runs the crawl to completion
    ///
    /// 1. Resolves and fetches the start URL (fatal on failure)
    /// 2. Loads robots.txt and builds the pre-fetch filter
    /// 3. Ingests the start URL and seeds the frontier
    /// 4. Pops tasks until the frontier is empty or `max-pages` is reached
    pub async fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        let start_time = Instant::now();
        let (start, response) = self.resolve_start().await?;
        self.report.start_url = start.clone();
        tracing::info!("Starting crawl at {}", start);

        let robots = fetch_robots(&self.fetcher, &response.final_url).await;
        let gate = PolitenessGate::new(robots, self.config.http.user_agent.clone());
        let mut filter = CrawlFilter::new(
            &start,
            &self.config.filters,
            self.config.crawler.allow_external,
            gate,
        )?;
        if host_of(&response.final_url) != host_of(&start) {
            tracing::info!("Start URL redirected to {}", response.final_url);
            filter.add_site_host(&response.final_url);
        }

        let outcome = self.ingestor.record(&start, &response)?;
        self.report.record(&outcome);
        self.frontier.mark_seen(&start);
        tracing::info!(
            "[d=0] {} -> source={} document={:?} status={}",
            start,
            outcome.source_id,
            outcome.document_id,
            outcome.http_status
        );

        self.seed_frontier(&start, &response, outcome.kind, &mut filter).await;

        let delay = self.effective_delay(filter.gate());
        let max_pages = self.config.crawler.max_pages;

        while self.report.ingested < max_pages {
            let task = match self.frontier.pop() {
                Some(task) => task,
                None => {
                    tracing::info!("Frontier is empty, crawl complete");
                    break;
                }
            };

            if let Err(reason) = filter.check(&task) {
                tracing::debug!("[skip {}] {}", reason, task.url);
                *self.report.skipped.entry(reason).or_insert(0) += 1;
                continue;
            }

            if let Err(e) = self.process_task(&task).await {
                tracing::error!("Error processing {}: {}", task.url, e);
                self.report.failed += 1;
                continue;
            }

            if self.report.ingested % 10 == 0 {
                let rate = f64::from(self.report.ingested) / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} pages ingested, {} in frontier, {:.2} pages/sec",
                    self.report.ingested,
                    self.frontier.len(),
                    rate
                );
            }

            tokio::time::sleep(delay).await;
        }

        if self.report.ingested >= max_pages {
            tracing::info!(
                "Reached max-pages ({}), {} URLs left in frontier",
                max_pages,
                self.frontier.len()
            );
        }

        tracing::info!(
            "Crawl completed: {} pages ingested from {} in {:?}, {} URLs seen ({} new, {} changed, {} unchanged, {} error statuses, {} failed, {} skipped)",
            self.report.ingested,
            start,
            start_time.elapsed(),
            self.frontier.seen_count(),
            self.report.new_documents,
            self.report.changed_documents,
            self.report.unchanged,
            self.report.error_status,
            self.report.failed,
            self.report.total_skipped()
        );

        Ok(self.report.clone())
    }

    /// Canonicalizes, probes and fetches the start URL
    ///
    /// A transport failure is retried once with the `www.` prefix toggled.
    async fn resolve_start(&self) -> Result<(String, FetchResult), CrawlError> {
        let raw = self.config.crawler.start_url.as_deref().unwrap_or_default();
        let mut start = canonicalize(raw, None).ok_or_else(|| CrawlError::StartUrl {
            url: raw.to_string(),
            reason: "not an http(s) URL".to_string(),
        })?;

        if self.config.discovery.investor_probe {
            if let Some(investor) = guess_investor_start(&self.fetcher, &start).await {
                tracing::info!("Investor host found, starting at {} instead", investor);
                start = investor;
            }
        }

        let first_error = match self.fetcher.fetch(&start).await {
            Ok(response) => return Ok((start, response)),
            Err(e) => e,
        };

        let alternative = toggle_www(&start);
        if alternative == start {
            return Err(CrawlError::StartUrl {
                url: start,
                reason: first_error.to_string(),
            });
        }

        tracing::warn!(
            "Start URL {} failed ({}), trying {}",
            start,
            first_error,
            alternative
        );
        match self.fetcher.fetch(&alternative).await {
            Ok(response) => Ok((alternative, response)),
            Err(e) => Err(CrawlError::StartUrl {
                url: start,
                reason: e.to_string(),
            }),
        }
    }

    /// Seeds the frontier after the start URL has been ingested
    ///
    /// Order: discovered IR hosts, well-known paths, sitemap, start-page links.
    async fn seed_frontier(
        &mut self,
        start: &str,
        response: &FetchResult,
        kind: DocumentKind,
        filter: &mut CrawlFilter,
    ) {
        let discovery = self.config.discovery.clone();

        if discovery.discover_ir_hosts {
            let hosts: Vec<String> =
                discover_ir_hosts(&self.fetcher, start, discovery.ir_host_limit)
                    .await
                    .into_iter()
                    .filter(|host| host != start)
                    .collect();
            for host in &hosts {
                filter.add_site_host(host);
            }
            let added = self.frontier.enqueue_seeds(hosts, 0, false);
            tracing::info!("IR hosts: {} seeded", added);
        }

        if discovery.auto_seed {
            let added = self.frontier.enqueue_seeds(
                well_known_seeds(start),
                1,
                discovery.seed_ignore_filters,
            );
            tracing::info!("Auto-seed: {} well-known paths", added);
        }

        if self.config.crawler.use_sitemap {
            let links = sitemap_links(&fetch_sitemap(&self.fetcher, start).await);
            let added = self.frontier.enqueue_discovered(links, 1);
            tracing::info!("Sitemap: {} links queued", added);
        } else {
            tracing::debug!("Sitemap: skipped (enable with --use-sitemap)");
        }

        if kind == DocumentKind::Html && response.is_success() && self.frontier.max_depth() > 0 {
            let links = extract_links(
                &response.text(),
                &response.final_url,
                self.config.crawler.max_links,
            );
            let added = self.frontier.enqueue_discovered(links, 1);
            tracing::info!("Start page: {} links queued", added);
        }
    }

    /// Fetches and ingests one task, queueing its links
    async fn process_task(&mut self, task: &CrawlTask) -> Result<IngestOutcome, CrawlError> {
        let response = self.fetcher.fetch(&task.url).await?;
        let outcome = self.ingestor.record(&task.url, &response)?;
        self.report.record(&outcome);

        tracing::info!(
            "[d={}] {} -> source={} document={:?} status={} ({})",
            task.depth,
            task.url,
            outcome.source_id,
            outcome.document_id,
            outcome.http_status,
            outcome.change
        );

        if outcome.kind == DocumentKind::Html
            && response.is_success()
            && task.depth < self.frontier.max_depth()
        {
            let links = extract_links(
                &response.text(),
                &response.final_url,
                self.config.crawler.max_links,
            );
            let found = links.len();
            let added = self.frontier.enqueue_discovered(links, task.depth + 1);
            tracing::debug!("[d={}] {} links found, {} new", task.depth, found, added);
        }

        Ok(outcome)
    }

    /// The configured delay, raised to the robots Crawl-delay when larger
    fn effective_delay(&self, gate: &PolitenessGate) -> Duration {
        let configured = self.config.crawler.delay();
        match gate.crawl_delay() {
            Some(crawl_delay) if crawl_delay > configured => {
                tracing::info!("Using robots.txt Crawl-delay of {:?}", crawl_delay);
                crawl_delay
            }
            _ => configured,
        }
    }
}

/// Runs the main crawl operation
///
/// Opens the store named by `storage.database-url` and crawls from
/// `crawler.start-url`.
///
/// # Arguments
///
/// * `config` - The crawl configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed (individual URLs may have failed)
/// * `Err(CrawlError)` - Configuration, store or start URL failure
///
/// # Example
///
/// ```no_run
/// use listedinc_crawler::config::Config;
/// use listedinc_crawler::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::default();
/// config.crawler.start_url = Some("https://www.example.se".to_string());
/// config.storage.database_url = Some("sqlite://ir.db".to_string());
/// let report = run_crawl(config).await?;
/// println!("{} pages ingested", report.ingested);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    let database_url = config
        .storage
        .database_url
        .clone()
        .ok_or(ConfigError::MissingDatabaseUrl)?;
    let storage: SqliteStorage = open_storage(&database_url)?;
    let mut coordinator = Coordinator::new(config, storage)?;
    coordinator.run().await
}
