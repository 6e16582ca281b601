//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler user agent and TLS policy
//! - GET requests returning the raw response bytes
//! - Retry logic with capped exponential backoff for transport failures

use crate::config::HttpConfig;
use crate::CrawlError;
use reqwest::{header, Certificate, Client};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for the pause between two attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// How server certificates are verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify against the built-in root store
    Verify,
    /// Verify against the built-in roots plus every certificate in a PEM bundle
    CustomCa(PathBuf),
    /// Accept any certificate
    Insecure,
}

/// Result of a completed HTTP exchange
///
/// Error statuses (4xx/5xx) are responses, not failures, and are reported
/// through `status_code`.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// ETag header value
    pub etag: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Returns true for statuses below 400
    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds an HTTP client with the crawler configuration
///
/// Redirects are followed with reqwest's default policy and responses are
/// transparently decompressed.
///
/// # Arguments
///
/// * `user_agent` - The user agent string sent with every request
/// * `tls` - The TLS verification policy
/// * `timeout` - Default per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(CrawlError)` - The CA bundle could not be read or the client failed to build
pub fn build_http_client(
    user_agent: &str,
    tls: &TlsPolicy,
    timeout: Duration,
) -> Result<Client, CrawlError> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    match tls {
        TlsPolicy::Verify => {}
        TlsPolicy::Insecure => {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        TlsPolicy::CustomCa(path) => {
            let pem = std::fs::read(path)?;
            let certificates = load_pem_bundle(&pem)?;
            tracing::debug!(
                "Loaded {} CA certificate(s) from {}",
                certificates.len(),
                path.display()
            );
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
    }

    Ok(builder.build()?)
}

/// Parses every certificate of a PEM bundle
fn load_pem_bundle(pem: &[u8]) -> Result<Vec<Certificate>, CrawlError> {
    Ok(Certificate::from_pem_bundle(pem)?)
}

/// Pause before retry number `attempt` (0-based): `min(base * 2^attempt, 4s)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.checked_mul(factor)
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// HTTP fetcher with bounded retries
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    retries: u32,
    backoff_base: Duration,
}

impl Fetcher {
    /// Creates a fetcher around an existing client
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `timeout` - Default per-request timeout
    /// * `retries` - Default number of attempts per fetch (at least 1)
    pub fn new(client: Client, timeout: Duration, retries: u32) -> Self {
        Self {
            client,
            timeout,
            retries: retries.max(1),
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Creates a fetcher from the HTTP configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, &config.tls_policy(), config.timeout())?;
        Ok(Self::new(client, config.timeout(), config.retries).with_backoff_base(config.backoff_base()))
    }

    /// Overrides the backoff base (1s by default)
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Fetches a URL with the default timeout and retry count
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, CrawlError> {
        self.fetch_with(url, self.timeout, self.retries).await
    }

    /// Fetches a URL once with a custom timeout
    ///
    /// Used for best-effort auxiliary requests (robots.txt, sitemaps, host
    /// probes) where a failure is not worth retrying.
    pub async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<FetchResult, CrawlError> {
        self.fetch_with(url, timeout, 1).await
    }

    /// Fetches a URL with full retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Any HTTP status | Returned as a response, no retry |
    /// | Timeout / connection error / body read error | Retry with backoff |
    /// | Last attempt failed | `CrawlError::Http` |
    ///
    /// The pause before retry `i` is `min(base * 2^i, 4s)`.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Per-attempt timeout
    /// * `retries` - Number of attempts (at least 1)
    pub async fn fetch_with(
        &self,
        url: &str,
        timeout: Duration,
        retries: u32,
    ) -> Result<FetchResult, CrawlError> {
        let attempts = retries.max(1);
        let mut attempt = 0;

        loop {
            match self.request(url, timeout).await {
                Ok(result) => return Ok(result),
                Err(source) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(CrawlError::Http {
                            url: url.to_string(),
                            source,
                        });
                    }
                    let delay = backoff_delay(self.backoff_base, attempt - 1);
                    tracing::debug!(
                        "Fetch attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        attempts,
                        url,
                        source,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn request(&self, url: &str, timeout: Duration) -> Result<FetchResult, reqwest::Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = header_value(response.headers(), header::CONTENT_TYPE);
        let etag = header_value(response.headers(), header::ETAG);
        let body = response.bytes().await?.to_vec();

        tracing::trace!("GET {} -> {} ({} bytes)", url, status_code, body.len());

        Ok(FetchResult {
            final_url,
            status_code,
            content_type,
            etag,
            body,
        })
    }
}

fn header_value(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(
            "listedinc-crawler/0.1",
            &TlsPolicy::Verify,
            Duration::from_secs(30),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_insecure_client() {
        let client = build_http_client(
            "listedinc-crawler/0.1",
            &TlsPolicy::Insecure,
            Duration::from_secs(30),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_missing_ca_bundle_fails() {
        let client = build_http_client(
            "listedinc-crawler/0.1",
            &TlsPolicy::CustomCa("/nonexistent/ca.pem".into()),
            Duration::from_secs(30),
        );
        assert!(matches!(client, Err(CrawlError::Io(_))));
    }

    #[test]
    fn test_empty_pem_bundle_has_no_certificates() {
        assert!(load_pem_bundle(b"no certificates here").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_pem_bundle_fails() {
        let pem = b"-----BEGIN CERTIFICATE-----\n!!not base64!!\n-----END CERTIFICATE-----\n";
        assert!(matches!(load_pem_bundle(pem), Err(CrawlError::Reqwest(_))));
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
    }

    #[test]
    fn test_fetch_result_success_boundary() {
        let mut result = FetchResult {
            final_url: "https://example.se/".to_string(),
            status_code: 399,
            content_type: None,
            etag: None,
            body: b"hej".to_vec(),
        };
        assert!(result.is_success());
        result.status_code = 404;
        assert!(!result.is_success());
        assert_eq!(result.text(), "hej");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_error() {
        let client = build_http_client(
            "listedinc-crawler/0.1",
            &TlsPolicy::Verify,
            Duration::from_secs(2),
        )
        .unwrap();
        let fetcher = Fetcher::new(client, Duration::from_secs(2), 2)
            .with_backoff_base(Duration::from_millis(1));

        // Port 9 (discard) on localhost is not expected to accept connections
        let result = fetcher.fetch("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(CrawlError::Http { .. })));
    }
}
