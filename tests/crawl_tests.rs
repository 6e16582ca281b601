//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch → ingest → extract-links cycle against a SQLite store.

use chrono::NaiveDate;
use listedinc_crawler::config::Config;
use listedinc_crawler::crawler::{Coordinator, Fetcher, SkipReason};
use listedinc_crawler::storage::{SqliteStorage, Storage};
use listedinc_crawler::{ChangeKind, CrawlError, Ingestor, MetadataExtractor};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration crawling from `start`
fn test_config(start: &str) -> Config {
    let mut config = Config::default();
    config.crawler.start_url = Some(start.to_string());
    config.crawler.delay_ms = 0;
    config.http.retries = 1;
    config.http.backoff_base_ms = 1;
    config.http.timeout_secs = 5;
    config.discovery.investor_probe = false;
    config
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_pdf(server: &MockServer, route: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.to_vec(), "application/pdf"))
        .mount(server)
        .await;
}

fn links_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();
    format!("<html><head><title>Start</title></head><body><ul>{}</ul></body></html>", anchors)
}

fn source_id(storage: &SqliteStorage, url: &str) -> i64 {
    storage
        .latest_source(url)
        .unwrap()
        .unwrap_or_else(|| panic!("no source for {}", url))
        .id
}

async fn crawl_into(config: Config, db: &Path) -> listedinc_crawler::crawler::CrawlReport {
    let storage = SqliteStorage::new(db).unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    coordinator.run().await.unwrap()
}

#[tokio::test]
async fn test_ir_links_are_crawled_first() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        &links_page(&["/om-oss", "/rapporter/q1.pdf", "/investors", "/press"]),
    )
    .await;
    mount_html(&server, "/om-oss", "<p>Om oss</p>").await;
    mount_html(&server, "/investors", "<p>Investors</p>").await;
    mount_html(&server, "/press", "<p>Press</p>").await;
    mount_pdf(&server, "/rapporter/q1.pdf", b"%PDF-1.4 not a real report").await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config(&base), storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 5);
    assert_eq!(report.new_documents, 5);
    assert_eq!(report.failed, 0);

    let storage = coordinator.storage();
    let start = source_id(storage, &format!("{}/", base));
    let investors = source_id(storage, &format!("{}/investors", base));
    let press = source_id(storage, &format!("{}/press", base));
    let pdf = source_id(storage, &format!("{}/rapporter/q1.pdf", base));
    let plain = source_id(storage, &format!("{}/om-oss", base));

    // Source rows are created in ingest order
    assert!(start < investors);
    assert!(investors < press);
    assert!(press < pdf);
    assert!(pdf < plain);

    let types = storage.count_sources_by_type().unwrap();
    assert_eq!(types.get("html"), Some(&4));
    assert_eq!(types.get("pdf"), Some(&1));
}

#[tokio::test]
async fn test_robots_disallow_skips_without_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /intern\n"),
        )
        .mount(&server)
        .await;
    mount_html(&server, "/", &links_page(&["/intern/rapport", "/nyheter"])).await;
    mount_html(&server, "/nyheter", "<p>Nyheter</p>").await;
    Mock::given(method("GET"))
        .and(path("/intern/rapport"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hemligt"))
        .expect(0)
        .mount(&server)
        .await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config(&base), storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(report.skipped_for(SkipReason::Robots), 1);
    assert!(coordinator
        .storage()
        .latest_source(&format!("{}/intern/rapport", base))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_external_links_are_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        &links_page(&["https://elsewhere.example/ir", "/kontakt"]),
    )
    .await;
    mount_html(&server, "/kontakt", "<p>Kontakt</p>").await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config(&base), storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(report.skipped_for(SkipReason::External), 1);
}

#[tokio::test]
async fn test_include_filter() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", &links_page(&["/produkter", "/rapporter"])).await;
    mount_html(&server, "/rapporter", "<p>Rapporter</p>").await;
    Mock::given(method("GET"))
        .and(path("/produkter"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.filters.include.push("rapport".to_string());

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(report.skipped_for(SkipReason::Filtered), 1);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", &links_page(&["/a"])).await;
    mount_html(&server, "/a", &links_page(&["/b"])).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.crawler.max_depth = 1;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 2);
}

#[tokio::test]
async fn test_max_pages_includes_start_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", &links_page(&["/a", "/b", "/c", "/d"])).await;
    for route in ["/a", "/b", "/c", "/d"] {
        mount_html(&server, route, "<p>sida</p>").await;
    }

    let mut config = test_config(&base);
    config.crawler.max_pages = 3;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 3);
    assert_eq!(coordinator.storage().count_documents().unwrap(), 3);
}

#[tokio::test]
async fn test_error_status_is_recorded_without_document() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", &links_page(&["/saknas"])).await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config(&base), storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(report.error_status, 1);

    let storage = coordinator.storage();
    let missing = storage
        .latest_source(&format!("{}/saknas", base))
        .unwrap()
        .unwrap();
    assert_eq!(missing.http_status, Some(404));
    assert_eq!(missing.checksum, None);
    assert_eq!(storage.count_documents().unwrap(), 1);
    assert_eq!(storage.count_error_sources().unwrap(), 1);
}

#[tokio::test]
async fn test_recrawl_unchanged_keeps_documents() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", &links_page(&["/press"])).await;
    mount_html(&server, "/press", "<p>Pressmeddelanden</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ir.db");

    let first = crawl_into(test_config(&base), &db).await;
    assert_eq!(first.new_documents, 2);

    let second = crawl_into(test_config(&base), &db).await;
    assert_eq!(second.ingested, 2);
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.new_documents, 0);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.count_documents().unwrap(), 2);

    let start = storage.latest_source(&format!("{}/", base)).unwrap().unwrap();
    assert_eq!(start.http_status, Some(200));
    assert!(start.last_fetched_at.is_some());
    let document = storage.latest_document(start.id).unwrap().unwrap();
    assert_eq!(document.checksum, start.checksum.unwrap());
}

#[tokio::test]
async fn test_recrawl_changed_adds_document() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ir.db");

    mount_html(&server, "/", "<p>Första versionen</p>").await;
    crawl_into(test_config(&base), &db).await;

    server.reset().await;
    mount_html(&server, "/", "<p>Andra versionen</p>").await;
    let report = crawl_into(test_config(&base), &db).await;
    assert_eq!(report.changed_documents, 1);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.count_documents().unwrap(), 2);
    assert_eq!(storage.count_sources_by_type().unwrap().get("html"), Some(&1));

    let source = storage.latest_source(&format!("{}/", base)).unwrap().unwrap();
    let latest = storage.latest_document(source.id).unwrap().unwrap();
    assert_eq!(Some(latest.checksum), source.checksum);
}

#[tokio::test]
async fn test_identical_pdfs_share_one_blob() {
    let server = MockServer::start().await;
    let base = server.uri();
    let bytes = b"%PDF-1.4 same bytes twice";

    mount_html(&server, "/", &links_page(&["/a.pdf", "/b.pdf"])).await;
    mount_pdf(&server, "/a.pdf", bytes).await;
    mount_pdf(&server, "/b.pdf", bytes).await;

    let mut config = test_config(&base);
    config.storage.pdf_to_db = true;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    coordinator.run().await.unwrap();

    let storage = coordinator.storage();
    assert_eq!(storage.count_documents().unwrap(), 3);
    assert_eq!(storage.blob_totals().unwrap(), (1, bytes.len() as u64));

    let a = storage.latest_source(&format!("{}/a.pdf", base)).unwrap().unwrap();
    let b = storage.latest_source(&format!("{}/b.pdf", base)).unwrap().unwrap();
    let doc_a = storage.latest_document(a.id).unwrap().unwrap();
    let doc_b = storage.latest_document(b.id).unwrap().unwrap();
    assert_eq!(doc_a.doc_type, "report");
    assert!(doc_a.blob_id.is_some());
    assert_eq!(doc_a.blob_id, doc_b.blob_id);

    let blob = storage.get_blob(doc_a.blob_id.unwrap()).unwrap().unwrap();
    assert_eq!(blob.content_type, "application/pdf");
    assert_eq!(blob.content_length, bytes.len() as u64);
    assert_eq!(blob.data, bytes.to_vec());
}

#[tokio::test]
async fn test_metadata_from_json_ld_and_contacts() {
    let server = MockServer::start().await;
    let base = server.uri();

    let page = r#"<html>
        <head>
            <title>Bokslutskommuniké 2023</title>
            <script type="application/ld+json">
                {"@context": "https://schema.org", "@type": "NewsArticle",
                 "datePublished": "2024-02-15T08:00:00+01:00",
                 "keywords": ["Rapporter", "Bokslut"]}
            </script>
        </head>
        <body>
            <h1>Bokslutskommuniké 2023</h1>
            <section>
                <p>Per Holm</p>
                <p>VD</p>
                <p><a href="mailto:Per.Holm@example.se">per.holm@example.se</a></p>
                <p>Mobil 070-111 22 33</p>
            </section>
        </body>
    </html>"#;
    mount_html(&server, "/", page).await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config(&base), storage).unwrap();
    coordinator.run().await.unwrap();

    let storage = coordinator.storage();
    let source = storage.latest_source(&format!("{}/", base)).unwrap().unwrap();
    let document = storage.latest_document(source.id).unwrap().unwrap();

    assert_eq!(document.published_at, NaiveDate::from_ymd_opt(2024, 2, 15));
    assert_eq!(document.headings, vec!["Bokslutskommuniké 2023"]);
    assert!(document.tags.iter().any(|t| t == "Bokslut"));

    assert_eq!(document.contacts.emails, vec!["per.holm@example.se"]);
    assert_eq!(document.contacts.phones, vec!["070-111 22 33"]);
    let person = &document.contacts.people[0];
    assert_eq!(person.name.as_deref(), Some("Per Holm"));
    assert_eq!(person.role.as_deref(), Some("VD"));
    assert_eq!(person.phone.as_deref(), Some("070-111 22 33"));

    assert_eq!(storage.count_dated_documents().unwrap(), 1);
    assert_eq!(storage.count_documents_with_contacts().unwrap(), 1);
}

#[tokio::test]
async fn test_sitemap_seeds_unlinked_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>{}/arsredovisning</loc></url>
        </urlset>"#,
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
        .mount(&server)
        .await;
    mount_html(&server, "/", "<p>Ingen länk</p>").await;
    Mock::given(method("GET"))
        .and(path("/arsredovisning"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<p>Årsredovisning</p>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.crawler.use_sitemap = true;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 2);
}

#[tokio::test]
async fn test_sitemap_index_expands_child_sitemaps() {
    let server = MockServer::start().await;
    let base = server.uri();

    let index = format!(
        r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>{base}/sitemap-pages.xml</loc></sitemap>
            <sitemap><loc>{base}/sitemap-reports.xml</loc></sitemap>
        </sitemapindex>"#
    );
    let pages = format!(
        r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>{base}/investerare</loc></url>
            <url><loc>{base}/bilder/logo.png</loc></url>
        </urlset>"#
    );
    let reports = format!(
        r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>{base}/rapporter/q1.pdf</loc></url>
        </urlset>"#
    );
    for (route, body) in [
        ("/sitemap.xml", index),
        ("/sitemap-pages.xml", pages),
        ("/sitemap-reports.xml", reports),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/xml"))
            .expect(1)
            .mount(&server)
            .await;
    }
    mount_html(&server, "/", "<p>Ingen länk</p>").await;
    mount_html(&server, "/investerare", "<p>Investerare</p>").await;
    mount_pdf(&server, "/rapporter/q1.pdf", b"%PDF-1.4 delarsrapport").await;
    Mock::given(method("GET"))
        .and(path("/bilder/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.crawler.use_sitemap = true;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 3);
    let storage = coordinator.storage();
    assert!(storage
        .latest_source(&format!("{}/investerare", base))
        .unwrap()
        .is_some());
    assert!(storage
        .latest_source(&format!("{}/rapporter/q1.pdf", base))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_redirected_start_host_counts_as_same_site() {
    let server = MockServer::start().await;
    let base = server.uri();
    let start = format!("http://localhost:{}/", server.address().port());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/home", base).as_str()),
        )
        .mount(&server)
        .await;
    mount_html(&server, "/home", &links_page(&["/a", "/b"])).await;
    mount_html(&server, "/a", "<p>A</p>").await;
    mount_html(&server, "/b", "<p>B</p>").await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config(&start), storage).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.ingested, 3);
    assert_eq!(report.skipped_for(SkipReason::External), 0);

    let storage = coordinator.storage();
    // The start page is stored under the requested URL, its links under the final host
    assert!(storage.latest_source(&start).unwrap().is_some());
    assert!(storage
        .latest_source(&format!("{}/a", base))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_start_falls_back_to_www_toggle() {
    let server = MockServer::start().await;
    let port = server.address().port();

    // The fallback only runs when the www host cannot be resolved
    if tokio::net::lookup_host(("www.localhost", port)).await.is_ok() {
        eprintln!("www.localhost resolves on this host, skipping");
        return;
    }

    mount_html(&server, "/", &links_page(&["/kontakt"])).await;
    mount_html(&server, "/kontakt", "<p>Kontakt</p>").await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(
        test_config(&format!("http://www.localhost:{}/", port)),
        storage,
    )
    .unwrap();
    let report = coordinator.run().await.unwrap();

    let fallback = format!("http://localhost:{}/", port);
    assert_eq!(report.start_url, fallback);
    assert_eq!(report.ingested, 2);
    assert!(coordinator
        .storage()
        .latest_source(&fallback)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_unreachable_start_url_fails() {
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(test_config("http://127.0.0.1:1/"), storage).unwrap();

    let result = coordinator.run().await;
    assert!(matches!(result, Err(CrawlError::StartUrl { .. })));
    assert_eq!(coordinator.storage().count_documents().unwrap(), 0);
}

#[tokio::test]
async fn test_single_url_ingest() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/investors", "<h1>Investors</h1>").await;

    let config = test_config(&base);
    let fetcher = Fetcher::from_config(&config.http).unwrap();
    let mut ingestor = Ingestor::new(
        SqliteStorage::new_in_memory().unwrap(),
        MetadataExtractor::default(),
        false,
    );

    let url = format!("{}/investors", base);
    let first = ingestor.ingest(&fetcher, &url).await.unwrap();
    let second = ingestor.ingest(&fetcher, &url).await.unwrap();

    assert_eq!(first.change, ChangeKind::New);
    assert_eq!(second.change, ChangeKind::Unchanged);
    assert_eq!(first.document_id, second.document_id);
    assert_eq!(ingestor.storage().count_documents().unwrap(), 1);
}
