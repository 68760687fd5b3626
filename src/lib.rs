//! Dantri crawler: a polite, concurrent news crawler
//!
//! This crate discovers topic pages on a news site, paginates through their
//! article listings, and fetches and parses every article through a bounded
//! worker pool with per-request retry, politeness delays and drain detection.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

pub use crawler::FetchError;

/// Main error type for crawler operations
///
/// Per-URL failures never surface here; they are recorded in the run
/// statistics. Only setup-level problems abort a run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker pool size must be greater than 0, got {0}")]
    InvalidConcurrency(usize),

    #[error("Pagination limit must be greater than 0, got {0}")]
    InvalidPagination(u32),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL cache error: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("Failed to discover topics from {url}: {source}")]
    Discovery { url: String, source: FetchError },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{NewsRecord, Pipeline, PipelineMode, PipelineOptions, PipelineReport};
pub use output::RunStats;
pub use state::{PipelinePhase, WorkerState};
