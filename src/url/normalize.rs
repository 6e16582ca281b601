use crate::UrlError;
use url::Url;

/// Canonicalizes a URL into the form used as the crawl identity
///
/// # Canonicalization Steps
///
/// 1. Trim whitespace; resolve against `base` when given
/// 2. Without a base, a scheme-less input is treated as `https://`
/// 3. Reject anything that is not http/https or has no host
/// 4. Lowercase the host (done by the `url` crate for http/https)
/// 5. Remove the fragment
/// 6. Empty path becomes `/`; a trailing slash on a non-root path is removed
/// 7. The query string is kept verbatim
///
/// The result is idempotent: canonicalizing a canonical URL returns it unchanged.
///
/// # Arguments
///
/// * `raw` - The URL or relative reference to canonicalize
/// * `base` - Optional base URL for resolving relative references
///
/// # Returns
///
/// * `Some(String)` - The canonical URL
/// * `None` - The input cannot be expressed as an http(s) URL
///
/// # Examples
///
/// ```
/// use listedinc_crawler::url::canonicalize;
///
/// assert_eq!(
///     canonicalize("http://Example.com/a/", None).as_deref(),
///     Some("http://example.com/a")
/// );
/// ```
pub fn canonicalize(raw: &str, base: Option<&str>) -> Option<String> {
    canonical_url(raw, base).ok().map(String::from)
}

/// Same as [`canonicalize`] but keeps the parsed [`Url`] and reports why a
/// URL was rejected
pub fn canonical_url(raw: &str, base: Option<&str>) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let mut url = match base {
        Some(base) => {
            let base = Url::parse(&ensure_scheme(base)).map_err(|e| UrlError::Parse(e.to_string()))?;
            base.join(raw).map_err(|e| UrlError::Parse(e.to_string()))?
        }
        None => Url::parse(&ensure_scheme(raw)).map_err(|e| UrlError::Parse(e.to_string()))?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    Ok(url)
}

/// Prefixes `https://` when the string carries no scheme
///
/// Strings that already start with a scheme such as `http://`, `mailto:` or
/// `ftp://` are returned unchanged.
pub fn ensure_scheme(raw: &str) -> String {
    let raw = raw.trim();
    if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    }
}

fn has_scheme(raw: &str) -> bool {
    match raw.find(':') {
        Some(idx) if idx > 0 => {
            let scheme = &raw[..idx];
            let is_scheme = scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic());
            // "example.com:8080/x" has a port, not a scheme
            is_scheme && !raw[idx + 1..].starts_with(|c: char| c.is_ascii_digit())
        }
        _ => false,
    }
}
