use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// The port is never part of the result.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use listedinc_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Lower-cased host of a URL string, without the port
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_domain)
}

/// Returns true when both URLs point at the same host (ports are ignored)
pub fn same_site(a: &str, b: &str) -> bool {
    match (host_of(a), host_of(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Strips a leading `www.` from a host name
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Adds or removes the `www.` prefix on the URL's host
///
/// Used as the single DNS fallback when the start URL cannot be fetched.
/// Returns the input unchanged if it cannot be parsed.
pub fn toggle_www(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str().map(str::to_string) else {
        return url.to_string();
    };

    let toggled = match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => format!("www.{}", host),
    };

    if parsed.set_host(Some(&toggled)).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}

/// `<scheme>://<host>[:port]/` for a URL
pub fn origin_root(url: &Url) -> String {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Investor.Example.COM/").unwrap();
        assert_eq!(
            extract_domain(&url),
            Some("investor.example.com".to_string())
        );
    }

    #[test]
    fn test_same_site_ignores_port_and_path() {
        assert!(same_site(
            "http://127.0.0.1:4000/a",
            "http://127.0.0.1:4000/b/c"
        ));
        assert!(same_site("https://example.com/", "https://example.com:443/x"));
        assert!(!same_site("https://example.com/", "https://www.example.com/"));
        assert!(!same_site("https://example.com/", "not a url"));
    }

    #[test]
    fn test_toggle_www() {
        assert_eq!(
            toggle_www("https://example.se/ir"),
            "https://www.example.se/ir"
        );
        assert_eq!(
            toggle_www("https://www.example.se/ir"),
            "https://example.se/ir"
        );
        assert_eq!(toggle_www("garbage"), "garbage");
    }

    #[test]
    fn test_strip_www() {
        assert_eq!(strip_www("www.example.se"), "example.se");
        assert_eq!(strip_www("investor.example.se"), "investor.example.se");
    }

    #[test]
    fn test_origin_root() {
        let url = Url::parse("https://example.se:8443/ir/reports?x=1#y").unwrap();
        assert_eq!(origin_root(&url), "https://example.se:8443/");
    }
}
