//! HTML parser for news pages
//!
//! This module turns raw page content into structured data:
//! - Topic links from the home page
//! - Article links and the "next page" link from a topic listing page
//! - Title, author, timestamp and body from an article page
//!
//! Which elements hold which field is site-specific and comes from
//! [`SelectorConfig`]; this module only applies the selectors and enforces
//! the success/absence contract. A page missing any required article field
//! yields `None`, never an error.

use crate::config::SelectorConfig;
use crate::ConfigError;
use chrono::{DateTime, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// A fully parsed news article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub title: String,
    pub author: String,
    /// Publication time as displayed by the site (site-local)
    pub created_at: NaiveDateTime,
    pub content: String,
    /// Section the article belongs to, taken from the first path segment
    pub category: Option<String>,
    pub url: String,
}

/// Links found on one topic listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicPage {
    /// Absolute article URLs, in page order, without duplicates
    pub article_links: Vec<String>,

    /// Absolute URL of the following listing page, if the page links one
    pub next_page: Option<String>,
}

/// Selectors compiled once from configuration
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    topic_links: Selector,
    article_links: Selector,
    next_page: Selector,
    title: Selector,
    author: Selector,
    created_at: Selector,
    created_at_attr: Option<String>,
    content: Selector,
    paragraph: Selector,
}

impl CompiledSelectors {
    /// Compiles every selector, failing on the first invalid one
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            topic_links: compile_selector("topic-links", &config.topic_links)?,
            article_links: compile_selector("article-links", &config.article_links)?,
            next_page: compile_selector("next-page", &config.next_page)?,
            title: compile_selector("title", &config.title)?,
            author: compile_selector("author", &config.author)?,
            created_at: compile_selector("created-at", &config.created_at)?,
            created_at_attr: config.created_at_attr.clone(),
            content: compile_selector("content", &config.content)?,
            paragraph: compile_selector("paragraph", "p")?,
        })
    }
}

fn compile_selector(name: &str, source: &str) -> Result<Selector, ConfigError> {
    Selector::parse(source)
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, source, e)))
}

/// Extracts topic page URLs from the site's home page
///
/// # Arguments
///
/// * `selectors` - Compiled site selectors
/// * `page_url` - URL of the home page, used to resolve relative links
/// * `html` - The home page content
pub fn parse_topic_index(selectors: &CompiledSelectors, page_url: &Url, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    collect_links(&document, &selectors.topic_links, page_url)
}

/// Extracts article links and the next-page link from a topic listing page
pub fn parse_topic_page(selectors: &CompiledSelectors, page_url: &Url, html: &str) -> TopicPage {
    let document = Html::parse_document(html);

    let article_links = collect_links(&document, &selectors.article_links, page_url);
    let next_page = document
        .select(&selectors.next_page)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .find(|link| link != page_url.as_str());

    TopicPage {
        article_links,
        next_page,
    }
}

/// Extracts a [`NewsRecord`] from an article page
///
/// # Returns
///
/// * `Some(NewsRecord)` - Every required field was found and is non-empty
/// * `None` - The page does not have the expected shape
pub fn parse_article(selectors: &CompiledSelectors, url: &str, html: &str) -> Option<NewsRecord> {
    let document = Html::parse_document(html);

    let title = first_text(&document, &selectors.title)?;
    let author = first_text(&document, &selectors.author)?;
    let created_at = extract_timestamp(&document, selectors)?;
    let content = extract_content(&document, selectors)?;

    Some(NewsRecord {
        title,
        author,
        created_at,
        content,
        category: category_from_url(url),
        url: url.to_string(),
    })
}

/// Parses the timestamp formats used by news sites
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]` and the
/// Vietnamese display form `Thứ hai, 12/05/2024 - 08:30`. Offsets are dropped
/// after converting to the wall-clock time they describe.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }

    const ISO_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    if let Some(parsed) = ISO_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(parsed);
    }

    // Drop the weekday prefix ("Thứ hai, ")
    let display = raw.rsplit_once(", ").map_or(raw, |(_, rest)| rest).trim();
    ["%d/%m/%Y - %H:%M", "%d/%m/%Y %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(display, format).ok())
}

fn extract_timestamp(document: &Html, selectors: &CompiledSelectors) -> Option<NaiveDateTime> {
    let element = document.select(&selectors.created_at).next()?;

    let raw = selectors
        .created_at_attr
        .as_deref()
        .and_then(|attr| element.value().attr(attr))
        .map(str::to_string)
        .unwrap_or_else(|| element_text(element));

    parse_timestamp(&raw)
}

/// Joins the paragraphs of the content container, falling back to its whole text
fn extract_content(document: &Html, selectors: &CompiledSelectors) -> Option<String> {
    let container = document.select(&selectors.content).next()?;

    let paragraphs: Vec<String> = container
        .select(&selectors.paragraph)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    let content = if paragraphs.is_empty() {
        element_text(container)
    } else {
        paragraphs.join("\n")
    };

    Some(content).filter(|c| !c.is_empty())
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Text of an element with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_links(document: &Html, selector: &Selector, page_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// Fragments are stripped so the same article is not collected twice.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);

    Some(absolute_url.to_string())
}

/// First path segment of an article URL, e.g. `the-thao` for `/the-thao/bai-viet.htm`
fn category_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    let first = segments.next()?;

    // A single segment is the article itself, not a section
    segments.next()?;

    Some(first.to_string()).filter(|segment| !segment.is_empty())
}
