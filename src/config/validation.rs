use crate::config::types::{Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteConfig};
use crate::crawler::CompiledSelectors;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

/// Upper bound on the worker pool size
const MAX_WORKERS: usize = 100;

/// Validates the entire configuration
///
/// Runs before any network activity so that a bad setting can never
/// degrade into a silent no-op crawl.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates worker pool and pagination settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.num_workers < 1 || config.num_workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "num_workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.num_workers
        )));
    }

    if config.max_pagination < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pagination must be >= 1, got {}",
            config.max_pagination
        )));
    }

    Ok(())
}

/// Validates the fetcher: timeout, user-agent pool and extra headers
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "request_timeout must be greater than 0ms".to_string(),
        ));
    }

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one entry".to_string(),
        ));
    }

    for agent in &config.user_agents {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agents cannot contain empty entries".to_string(),
            ));
        }
        HeaderValue::from_str(agent)
            .map_err(|_| ConfigError::InvalidHeader(format!("Invalid user agent '{}'", agent)))?;
    }

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("Invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::InvalidHeader(format!("Invalid value for header '{}'", name))
        })?;
    }

    Ok(())
}

/// Validates the site entry point and its selectors
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&config.home_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid home_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "home_url '{}' must use http or https",
            config.home_url
        )));
    }

    CompiledSelectors::compile(&config.selectors)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.url_cache.is_empty() {
        return Err(ConfigError::Validation(
            "url_cache cannot be empty".to_string(),
        ));
    }

    Ok(())
}
