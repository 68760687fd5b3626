//! Crawler coordinator - main crawl orchestration logic
//!
//! A crawl runs in two phases:
//! - Link discovery: fetch the home page, read its topic links, and follow each
//!   topic's listing pages up to the pagination limit, collecting article URLs
//! - Article scraping: run every collected URL through the work pipeline
//!
//! Discovered URLs can be cached on disk so a later run skips discovery.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::parser::NewsRecord;
use crate::crawler::pipeline::{Pipeline, PipelineMode, PipelineOptions, PipelineReport};
use crate::crawler::site::{ArticleHandler, NewsSite, SelectorSite};
use crate::state::{PhaseTracker, PipelinePhase};
use crate::storage::UrlCache;
use crate::CrawlError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Settings for one crawl run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Listing pages followed per topic
    pub max_pagination: u32,

    /// Pause before each network call
    pub politeness_delay: Duration,

    /// Worker pool size for the article phase
    pub num_workers: usize,

    /// Cap on article URLs processed
    pub num_news: usize,

    pub mode: PipelineMode,
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_pagination: config.max_pagination,
            politeness_delay: config.politeness_delay(),
            num_workers: config.num_workers,
            num_news: config.num_news,
            mode: PipelineMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S> {
    site: Arc<S>,
    options: CrawlOptions,
    cancel: CancellationToken,
    phase: PhaseTracker,
}

impl<S: NewsSite> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Options are usable
    /// * `Err(CrawlError)` - Zero workers or a zero pagination limit
    pub fn new(site: Arc<S>, options: CrawlOptions) -> Result<Self, CrawlError> {
        if options.num_workers == 0 {
            return Err(CrawlError::InvalidConcurrency(options.num_workers));
        }
        if options.max_pagination == 0 {
            return Err(CrawlError::InvalidPagination(options.max_pagination));
        }

        Ok(Self {
            site,
            options,
            cancel: CancellationToken::new(),
            phase: PhaseTracker::default(),
        })
    }

    /// Uses `token` to stop discovery and scraping between items
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase.current()
    }

    /// Receiver that observes every phase change of this coordinator
    pub fn subscribe_phase(&self) -> watch::Receiver<PipelinePhase> {
        self.phase.subscribe()
    }

    /// Runs a full crawl
    ///
    /// URLs come from `cache` when it holds a non-empty list; otherwise they
    /// are discovered and written to `cache`. A cancelled discovery is never
    /// written.
    pub async fn run(&self, cache: Option<&UrlCache>) -> Result<PipelineReport<NewsRecord>, CrawlError> {
        self.phase.set(PipelinePhase::CollectingLinks);

        let cached = match cache {
            Some(cache) => cache.load()?.filter(|urls| !urls.is_empty()),
            None => None,
        };

        let mut urls = match cached {
            Some(urls) => {
                tracing::info!("Using {} cached article URLs", urls.len());
                urls
            }
            None => {
                let urls = self.collect_links().await?;
                match cache {
                    Some(_) if self.cancel.is_cancelled() => {
                        tracing::info!("Discovery was cancelled, cache left untouched")
                    }
                    Some(cache) if !urls.is_empty() => cache.save(&urls)?,
                    Some(_) => tracing::warn!("No article URLs discovered, cache left untouched"),
                    None => {}
                }
                urls
            }
        };

        if urls.len() > self.options.num_news {
            tracing::info!(
                "Limiting run to {} of {} URLs",
                self.options.num_news,
                urls.len()
            );
            urls.truncate(self.options.num_news);
        }

        self.scrape_articles(urls).await
    }

    /// Discovers article URLs from the home page and every topic
    ///
    /// Links are deduplicated in first-seen order and capped at `num_news`.
    ///
    /// # Returns
    ///
    /// * `Ok(urls)` - Discovered article URLs (possibly empty)
    /// * `Err(CrawlError::Discovery)` - The home page could not be fetched
    pub async fn collect_links(&self) -> Result<Vec<String>, CrawlError> {
        self.phase.set(PipelinePhase::CollectingLinks);

        let home_url = self.site.home_url().clone();
        tracing::info!(site = self.site.name(), "Collecting links from {}", home_url);

        self.pause().await;
        let home = self
            .site
            .fetch(home_url.as_str())
            .await
            .map_err(|failure| CrawlError::Discovery {
                url: home_url.to_string(),
                source: failure.value,
            })?;

        let topics = self.site.parse_topics(&home.value);
        tracing::info!("Found {} topics", topics.len());

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for topic in &topics {
            if self.cancel.is_cancelled() {
                tracing::info!("Link collection cancelled");
                break;
            }

            for link in self.crawl_topic(topic).await {
                if links.len() >= self.options.num_news {
                    break;
                }
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }

            if links.len() >= self.options.num_news {
                tracing::info!("Reached limit of {} article URLs", self.options.num_news);
                break;
            }
        }

        tracing::info!("Collected {} article URLs", links.len());
        Ok(links)
    }

    /// Follows one topic's listing pages, at most `max_pagination` of them
    ///
    /// A page that cannot be fetched ends this topic only.
    pub async fn crawl_topic(&self, topic_url: &str) -> Vec<String> {
        let mut links = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(topic_url.to_string());
        let mut pages = 0;

        while pages < self.options.max_pagination {
            let Some(page_url) = next.take() else {
                break;
            };
            if self.cancel.is_cancelled() || !visited.insert(page_url.clone()) {
                break;
            }

            let url = match Url::parse(&page_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(url = %page_url, "Skipping invalid topic page URL: {}", e);
                    break;
                }
            };

            self.pause().await;
            pages += 1;

            match self.site.fetch(url.as_str()).await {
                Ok(fetched) => {
                    let listing = self.site.parse_topic_page(&url, &fetched.value);
                    tracing::debug!(
                        url = %url,
                        page = pages,
                        articles = listing.article_links.len(),
                        "Parsed topic page"
                    );
                    links.extend(listing.article_links);
                    next = listing.next_page;
                }
                Err(failure) => {
                    tracing::warn!(
                        url = %url,
                        attempts = failure.attempts,
                        error = %failure.value,
                        "Topic page fetch failed, ending topic"
                    );
                    break;
                }
            }
        }

        if next.is_some() {
            tracing::debug!(topic = topic_url, pages, "Pagination limit reached");
        }
        links
    }

    /// Fetches and parses every URL through the work pipeline
    pub async fn scrape_articles(&self, urls: Vec<String>) -> Result<PipelineReport<NewsRecord>, CrawlError> {
        let options = PipelineOptions::new(self.options.num_workers, self.options.politeness_delay)
            .with_mode(self.options.mode);

        Pipeline::new(options)
            .with_cancellation(self.cancel.clone())
            .with_phase_tracker(self.phase.clone())
            .run(urls, Arc::new(ArticleHandler::new(self.site.clone())))
            .await
    }

    async fn pause(&self) {
        if !self.options.politeness_delay.is_zero() {
            tokio::time::sleep(self.options.politeness_delay).await;
        }
    }
}

/// Runs a complete crawl of the configured site
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `mode` - How article workers are scheduled
/// * `fresh` - Discard the URL cache and rediscover links
/// * `cancel` - Stops the run between items when cancelled
///
/// # Returns
///
/// * `Ok(PipelineReport)` - Parsed records and run statistics
/// * `Err(CrawlError)` - Setup failed or the home page was unreachable
pub async fn run_crawl(
    config: &Config,
    mode: PipelineMode,
    fresh: bool,
    cancel: CancellationToken,
) -> Result<PipelineReport<NewsRecord>, CrawlError> {
    let site = Arc::new(SelectorSite::from_config(config)?);
    let options = CrawlOptions::from_config(&config.crawler).with_mode(mode);
    let coordinator = Coordinator::new(site, options)?.with_cancellation(cancel);

    let cache = UrlCache::new(&config.output.url_cache);
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring cached URLs)");
        cache.clear()?;
    }

    coordinator.run(Some(&cache)).await
}
