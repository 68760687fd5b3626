//! News site capability
//!
//! A [`NewsSite`] knows how to fetch its pages and how to read the three page
//! kinds the crawl visits: the home page (topic links), topic listing pages
//! (article links and the next page) and article pages.

use crate::config::Config;
use crate::crawler::fetcher::{with_retry, FetchError, FetchFailure, Fetched, Fetcher, RetryPolicy};
use crate::crawler::parser::{self, CompiledSelectors, NewsRecord, TopicPage};
use crate::crawler::pipeline::WorkHandler;
use crate::CrawlError;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Fetching and parsing for one news site
#[async_trait]
pub trait NewsSite: Send + Sync + 'static {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Entry point for link discovery
    fn home_url(&self) -> &Url;

    /// Retry budget for page fetches
    fn retry_policy(&self) -> RetryPolicy;

    /// A single fetch attempt
    async fn fetch_once(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches a page, retries included
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchFailure> {
        let policy = self.retry_policy();
        with_retry(&policy, |_| self.fetch_once(url)).await
    }

    /// Topic page URLs linked from the home page
    fn parse_topics(&self, html: &str) -> Vec<String>;

    /// Article links and the next-page link of a topic listing page
    fn parse_topic_page(&self, page_url: &Url, html: &str) -> TopicPage;

    /// Article record, or `None` when the page does not have the expected shape
    fn parse_article(&self, url: &str, html: &str) -> Option<NewsRecord>;
}

/// A [`NewsSite`] driven entirely by configured CSS selectors
///
/// The default configuration describes Dantri.
#[derive(Debug, Clone)]
pub struct SelectorSite {
    name: String,
    home_url: Url,
    fetcher: Fetcher,
    selectors: CompiledSelectors,
}

impl SelectorSite {
    pub fn new(name: impl Into<String>, home_url: Url, fetcher: Fetcher, selectors: CompiledSelectors) -> Self {
        Self {
            name: name.into(),
            home_url,
            fetcher,
            selectors,
        }
    }

    /// Builds the site from the `[site]` and `[fetcher]` sections
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let home_url = Url::parse(&config.site.home_url)?;
        let selectors = CompiledSelectors::compile(&config.site.selectors)?;
        let fetcher = Fetcher::new(&config.fetcher)?;

        Ok(Self::new(config.site.name.clone(), home_url, fetcher, selectors))
    }
}

#[async_trait]
impl NewsSite for SelectorSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn home_url(&self) -> &Url {
        &self.home_url
    }

    fn retry_policy(&self) -> RetryPolicy {
        *self.fetcher.retry_policy()
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        self.fetcher.fetch_once(url).await
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, FetchFailure> {
        self.fetcher.fetch(url).await
    }

    fn parse_topics(&self, html: &str) -> Vec<String> {
        parser::parse_topic_index(&self.selectors, &self.home_url, html)
    }

    fn parse_topic_page(&self, page_url: &Url, html: &str) -> TopicPage {
        parser::parse_topic_page(&self.selectors, page_url, html)
    }

    fn parse_article(&self, url: &str, html: &str) -> Option<NewsRecord> {
        parser::parse_article(&self.selectors, url, html)
    }
}

/// Runs article pages of a [`NewsSite`] through the work pipeline
pub struct ArticleHandler<S> {
    site: Arc<S>,
}

impl<S> ArticleHandler<S> {
    pub fn new(site: Arc<S>) -> Self {
        Self { site }
    }
}

#[async_trait]
impl<S: NewsSite> WorkHandler for ArticleHandler<S> {
    type Output = NewsRecord;

    fn retry_policy(&self) -> RetryPolicy {
        self.site.retry_policy()
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        self.site.fetch_once(url).await
    }

    fn parse(&self, url: &str, content: &str) -> Option<NewsRecord> {
        self.site.parse_article(url, content)
    }
}
