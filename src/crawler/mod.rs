//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-request headers, timeout and retry
//! - HTML parsing of topic listings and articles
//! - The work queue and the worker pool that drains it
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod pipeline;
mod queue;
mod site;

pub use coordinator::{run_crawl, Coordinator, CrawlOptions};
pub use fetcher::{
    build_http_client, with_retry, Attempts, FetchError, FetchFailure, Fetched, Fetcher, RetryPolicy,
};
pub use parser::{
    parse_article, parse_timestamp, parse_topic_index, parse_topic_page, CompiledSelectors,
    NewsRecord, TopicPage,
};
pub use pipeline::{run, Pipeline, PipelineMode, PipelineOptions, PipelineReport, WorkHandler};
pub use queue::{Closed, QueueSnapshot, WorkQueue, WorkTicket};
pub use site::{ArticleHandler, NewsSite, SelectorSite};
