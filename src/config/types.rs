use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Work distribution and pagination settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent workers draining the article queue
    #[serde(rename = "num-workers")]
    pub num_workers: usize,

    /// Pause before each network call (milliseconds)
    #[serde(rename = "politeness-delay")]
    pub politeness_delay: u64,

    /// Maximum number of listing pages followed per topic
    #[serde(rename = "max-pagination")]
    pub max_pagination: u32,

    /// Maximum number of article URLs processed in one run
    #[serde(rename = "num-news")]
    pub num_news: usize,
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            politeness_delay: 500,
            max_pagination: 1,
            num_news: 1000,
        }
    }
}

/// HTTP fetch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Additional attempts after the first one fails
    #[serde(rename = "retry-times")]
    pub retry_times: u32,

    /// Fixed sleep between attempts (milliseconds)
    #[serde(rename = "retry-backoff")]
    pub retry_backoff: u64,

    /// Timeout for a single attempt (milliseconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Pool of user-agent strings; one is picked per request
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl FetcherConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8".to_string(),
        );
        headers.insert(
            "Accept-Language".to_string(),
            "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        );

        Self {
            retry_times: 3,
            retry_backoff: 1000,
            request_timeout: 60_000,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".to_string(),
            ],
            headers,
        }
    }
}

/// Site description: where to start and how to read its pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Short name used in logs
    pub name: String,

    /// Home page listing the topics
    #[serde(rename = "home-url")]
    pub home_url: String,

    pub selectors: SelectorConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "dantri".to_string(),
            home_url: "https://dantri.com.vn".to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// CSS selectors locating each field on the site's pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Topic links on the home page
    #[serde(rename = "topic-links")]
    pub topic_links: String,

    /// Article links on a topic listing page
    #[serde(rename = "article-links")]
    pub article_links: String,

    /// "Next page" link on a topic listing page
    #[serde(rename = "next-page")]
    pub next_page: String,

    pub title: String,

    pub author: String,

    #[serde(rename = "created-at")]
    pub created_at: String,

    /// Attribute of the `created-at` element holding the timestamp.
    /// Omitting the key in a `[site.selectors]` table selects the element text;
    /// the built-in site reads `datetime`.
    #[serde(rename = "created-at-attr", default)]
    pub created_at_attr: Option<String>,

    /// Container of the article body; its paragraphs form the content
    pub content: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            topic_links: "nav.menu ol.menu-wrap > li.has-child > a".to_string(),
            article_links: "div.article-list article.article-item h3.article-title a[href]"
                .to_string(),
            next_page: "div.pagination a.page-item.next[href]".to_string(),
            title: "h1.title-page".to_string(),
            author: "div.author-name b".to_string(),
            created_at: "time.author-time".to_string(),
            created_at_attr: Some("datetime".to_string()),
            content: "div.singular-content".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON file caching the discovered article URLs
    #[serde(rename = "url-cache")]
    pub url_cache: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            url_cache: "data/urls.json".to_string(),
        }
    }
}
