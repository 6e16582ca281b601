//! listedinc command-line entry point
//!
//! Crawls investor-relations sites into the ingest database, ingests single
//! URLs or CSV lists of URLs, and prints store statistics.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use listedinc_crawler::config::{load_config_with_hash, validate, Config};
use listedinc_crawler::crawler::{crawl, Fetcher};
use listedinc_crawler::ingest::read_url_list;
use listedinc_crawler::output::{load_statistics, print_crawl_report, print_statistics};
use listedinc_crawler::storage::{open_storage, SqliteStorage};
use listedinc_crawler::{canonicalize, ConfigError, Ingestor, MetadataExtractor};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// listedinc: investor-relations crawler and ingester
///
/// Fetches a company's public pages and PDF reports, stores every new
/// content version in SQLite and extracts titles, publish dates, headings,
/// tags and contacts.
#[derive(Parser, Debug)]
#[command(name = "listedinc")]
#[command(version)]
#[command(about = "Investor-relations crawl and ingest pipeline", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to TOML configuration file
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Database connection string (sqlite://<path>, file:<path>, :memory: or a path)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site from a start URL
    Crawl(CrawlArgs),

    /// Fetch and ingest a single URL
    Ingest {
        /// The URL to ingest
        #[arg(long)]
        url: String,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Ingest every URL of a CSV file
    IngestList {
        /// CSV file with a `url` column (or URLs in the first column)
        #[arg(long, value_name = "CSV")]
        file: PathBuf,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Show statistics from the database and exit
    Stats,
}

/// Options shared by every command that fetches
#[derive(Args, Debug)]
struct FetchArgs {
    /// Disable TLS certificate verification
    #[arg(long, conflicts_with = "ca_bundle")]
    insecure: bool,

    /// PEM bundle with extra trusted root certificates
    #[arg(long, value_name = "PEM")]
    ca_bundle: Option<PathBuf>,

    /// Store raw PDF bytes in the blob store
    #[arg(long)]
    pdf_to_db: bool,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Start URL (scheme optional)
    #[arg(long)]
    url: Option<String>,

    /// Maximum number of ingested URLs, start URL included
    #[arg(long)]
    max_pages: Option<u32>,

    /// Maximum link depth from the start URL
    #[arg(long)]
    max_depth: Option<u32>,

    /// Pause between requests in seconds
    #[arg(long, value_name = "SECONDS")]
    sleep: Option<f64>,

    /// URL must match at least one of these regexes (repeatable)
    #[arg(long, value_name = "RE")]
    include: Vec<String>,

    /// Skip URLs matching any of these regexes (repeatable)
    #[arg(long, value_name = "RE")]
    exclude: Vec<String>,

    /// Only crawl hosts matching one of these regexes (repeatable)
    #[arg(long, value_name = "RE")]
    allowed_hosts: Vec<String>,

    /// Follow links outside the start site
    #[arg(long)]
    allow_external: bool,

    /// Seed the frontier from /sitemap.xml
    #[arg(long)]
    use_sitemap: bool,

    /// Discover investor-relations hosts and seed them
    #[arg(long)]
    discover_ir_hosts: bool,

    /// Maximum number of discovered IR hosts
    #[arg(long)]
    ir_host_limit: Option<usize>,

    /// Seed well-known IR and press paths
    #[arg(long)]
    auto_seed: bool,

    /// Auto-seeded paths bypass the include/exclude filters
    #[arg(long)]
    seed_ignore_filters: bool,

    /// Do not switch the start URL to investor.<domain>
    #[arg(long)]
    no_investor_probe: bool,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = load_configuration(cli.config.as_ref())?;
    if let Some(database_url) = cli.database_url {
        config.storage.database_url = Some(database_url);
    }

    match cli.command {
        Command::Crawl(args) => handle_crawl(config, args).await,
        Command::Ingest { url, fetch } => {
            apply_fetch_args(&mut config, &fetch);
            handle_ingest(&config, vec![url]).await
        }
        Command::IngestList { file, fetch } => {
            apply_fetch_args(&mut config, &fetch);
            let urls = read_url_list(&file)
                .with_context(|| format!("Failed to read URL list {}", file.display()))?;
            tracing::info!("Loaded {} URLs from {}", urls.len(), file.display());
            handle_ingest(&config, urls).await
        }
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listedinc_crawler=info,warn"),
            1 => EnvFilter::new("listedinc_crawler=debug,info"),
            2 => EnvFilter::new("listedinc_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load_configuration(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    match load_config_with_hash(path) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            Err(e.into())
        }
    }
}

fn apply_fetch_args(config: &mut Config, args: &FetchArgs) {
    if args.insecure {
        config.http.insecure = true;
    }
    if let Some(path) = &args.ca_bundle {
        config.http.ca_bundle = Some(path.clone());
    }
    if args.pdf_to_db {
        config.storage.pdf_to_db = true;
    }
}

fn apply_crawl_args(config: &mut Config, args: &CrawlArgs) {
    apply_fetch_args(config, &args.fetch);

    let crawler = &mut config.crawler;
    if let Some(url) = &args.url {
        crawler.start_url = Some(url.clone());
    }
    if let Some(max_pages) = args.max_pages {
        crawler.max_pages = max_pages;
    }
    if let Some(max_depth) = args.max_depth {
        crawler.max_depth = max_depth;
    }
    if let Some(sleep) = args.sleep {
        crawler.delay_ms = (sleep.max(0.0) * 1000.0).round() as u64;
    }
    crawler.allow_external |= args.allow_external;
    crawler.use_sitemap |= args.use_sitemap;

    let filters = &mut config.filters;
    filters.include.extend(args.include.iter().cloned());
    filters.exclude.extend(args.exclude.iter().cloned());
    filters.allowed_hosts.extend(args.allowed_hosts.iter().cloned());

    let discovery = &mut config.discovery;
    discovery.discover_ir_hosts |= args.discover_ir_hosts;
    if let Some(limit) = args.ir_host_limit {
        discovery.ir_host_limit = limit;
    }
    discovery.auto_seed |= args.auto_seed;
    discovery.seed_ignore_filters |= args.seed_ignore_filters;
    if args.no_investor_probe {
        discovery.investor_probe = false;
    }
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let database_url = config
        .storage
        .database_url
        .as_deref()
        .ok_or(ConfigError::MissingDatabaseUrl)?;
    let storage = open_storage(database_url)
        .with_context(|| format!("Failed to open database {}", database_url))?;
    Ok(storage)
}

/// Handles the crawl subcommand
async fn handle_crawl(mut config: Config, args: CrawlArgs) -> anyhow::Result<()> {
    apply_crawl_args(&mut config, &args);
    validate(&config)?;

    tracing::info!(
        "Crawl settings: max-pages={}, max-depth={}, delay={}ms, sitemap={}, external={}, pdf-to-db={}",
        config.crawler.max_pages,
        config.crawler.max_depth,
        config.crawler.delay_ms,
        config.crawler.use_sitemap,
        config.crawler.allow_external,
        config.storage.pdf_to_db
    );

    match crawl(config).await {
        Ok(report) => {
            print_crawl_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the ingest and ingest-list subcommands
///
/// Individual URL failures are logged; the command still succeeds.
async fn handle_ingest(config: &Config, urls: Vec<String>) -> anyhow::Result<()> {
    validate(config)?;
    let storage = open_database(config)?;
    let fetcher = Fetcher::from_config(&config.http)?;
    let mut ingestor = Ingestor::new(storage, MetadataExtractor::default(), config.storage.pdf_to_db);

    let total = urls.len();
    let mut failed = 0;
    for raw in urls {
        let Some(url) = canonicalize(&raw, None) else {
            tracing::warn!("Skipping invalid URL: {}", raw);
            failed += 1;
            continue;
        };

        match ingestor.ingest(&fetcher, &url).await {
            Ok(outcome) => println!(
                "[OK] {} -> source={} document={} status={} ({})",
                url,
                outcome.source_id,
                outcome
                    .document_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string()),
                outcome.http_status,
                outcome.change
            ),
            Err(e) => {
                tracing::error!("Error ingesting {}: {}", url, e);
                failed += 1;
            }
        }
    }

    if total > 1 {
        println!("Ingested {} of {} URLs ({} failed)", total - failed, total, failed);
    }
    Ok(())
}

/// Handles the stats subcommand
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);
    Ok(())
}
