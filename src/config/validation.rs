use crate::config::types::{Config, CrawlerConfig, DiscoveryConfig, FilterConfig, HttpConfig};
use crate::url::canonicalize;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_filter_config(&config.filters)?;
    validate_discovery_config(&config.discovery)?;
    Ok(())
}

/// Validates crawl loop settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(start) = &config.start_url {
        if canonicalize(start, None).is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "start-url '{}' is not an http(s) URL",
                start
            )));
        }
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_links < 1 {
        return Err(ConfigError::Validation(format!(
            "max-links must be >= 1, got {}",
            config.max_links
        )));
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.retries < 1 {
        return Err(ConfigError::Validation(format!(
            "retries must be >= 1, got {}",
            config.retries
        )));
    }

    if let Some(path) = &config.ca_bundle {
        if !config.insecure && !path.is_file() {
            return Err(ConfigError::Validation(format!(
                "ca-bundle '{}' does not exist",
                path.display()
            )));
        }
    }

    Ok(())
}

/// Validates that every filter pattern compiles
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    compile_patterns(&config.include)?;
    compile_patterns(&config.exclude)?;
    compile_patterns(&config.allowed_hosts)?;
    Ok(())
}

fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.discover_ir_hosts && config.ir_host_limit == 0 {
        tracing::warn!("discover-ir-hosts is enabled but ir-host-limit is 0");
    }
    Ok(())
}

/// Compiles filter patterns as case-insensitive regexes
///
/// # Returns
///
/// * `Ok(Vec<Regex>)` - One compiled regex per pattern, in order
/// * `Err(ConfigError::InvalidPattern)` - The first pattern that failed to compile
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}
