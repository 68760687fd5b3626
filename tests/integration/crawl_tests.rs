//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small news site and run the full
//! crawl cycle end-to-end: home page, paginated topic listings, articles.

use dantri_crawler::config::{Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteConfig};
use dantri_crawler::crawler::{run_crawl, Coordinator, CrawlOptions, SelectorSite};
use dantri_crawler::storage::UrlCache;
use dantri_crawler::{CrawlError, PipelineMode};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, cache_dir: &TempDir, max_pagination: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            num_workers: 3,
            politeness_delay: 0,
            max_pagination,
            num_news: 100,
        },
        fetcher: FetcherConfig {
            retry_times: 0,
            retry_backoff: 0,
            request_timeout: 2_000,
            ..FetcherConfig::default()
        },
        site: SiteConfig {
            name: "test".to_string(),
            home_url: base_url.to_string(),
            ..SiteConfig::default()
        },
        output: OutputConfig {
            url_cache: cache_dir
                .path()
                .join("urls.json")
                .to_string_lossy()
                .into_owned(),
        },
    }
}

fn home_page(topics: &[&str]) -> String {
    let items: String = topics
        .iter()
        .map(|topic| format!(r#"<li class="has-child"><a href="{}">Topic</a></li>"#, topic))
        .collect();
    format!(
        r#"<html><body><nav class="menu"><ol class="menu-wrap">{}</ol></nav></body></html>"#,
        items
    )
}

fn listing_page(articles: &[&str], next: Option<&str>) -> String {
    let items: String = articles
        .iter()
        .map(|href| {
            format!(
                r#"<article class="article-item"><h3 class="article-title"><a href="{}">Bài</a></h3></article>"#,
                href
            )
        })
        .collect();
    let pagination = next
        .map(|href| format!(r#"<div class="pagination"><a class="page-item next" href="{}">Trang sau</a></div>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><div class="article-list">{}</div>{}</body></html>"#,
        items, pagination
    )
}

fn article_page(title: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="title-page">{}</h1>
            <div class="author-name"><b>Phóng viên</b></div>
            <time class="author-time" datetime="2024-05-12T08:30:00+07:00">Chủ nhật, 12/05/2024 - 08:30</time>
            <div class="singular-content"><p>Mở đầu.</p><p>Kết thúc.</p></div>
        </body></html>"#,
        title
    )
}

async fn serve(mock_server: &MockServer, route: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(expected)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_collects_every_article() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().expect("temp dir");

    serve(&mock_server, "/", home_page(&["/the-thao.htm", "/kinh-doanh.htm"]), 1).await;
    serve(
        &mock_server,
        "/the-thao.htm",
        listing_page(&["/the-thao/bai-1.htm", "/the-thao/bai-2.htm"], Some("/the-thao/trang-2.htm")),
        1,
    )
    .await;
    serve(
        &mock_server,
        "/the-thao/trang-2.htm",
        listing_page(&["/the-thao/bai-3.htm", "/the-thao/bai-1.htm"], None),
        1,
    )
    .await;
    serve(
        &mock_server,
        "/kinh-doanh.htm",
        listing_page(&["/kinh-doanh/bai-4.htm"], None),
        1,
    )
    .await;
    for (route, title) in [
        ("/the-thao/bai-1.htm", "Bài 1"),
        ("/the-thao/bai-2.htm", "Bài 2"),
        ("/the-thao/bai-3.htm", "Bài 3"),
        ("/kinh-doanh/bai-4.htm", "Bài 4"),
    ] {
        serve(&mock_server, route, article_page(title), 1).await;
    }

    let config = create_test_config(&mock_server.uri(), &cache_dir, 5);
    let report = run_crawl(&config, PipelineMode::Threaded, true, CancellationToken::new())
        .await
        .expect("crawl should succeed");

    let mut titles: Vec<_> = report.results.iter().map(|r| r.title.clone()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Bài 1", "Bài 2", "Bài 3", "Bài 4"]);
    assert_eq!(report.stats.succeeded, 4);
    assert_eq!(report.stats.failed, 0);
    assert!(report.queue.is_drained());

    let sport = report
        .results
        .iter()
        .find(|r| r.title == "Bài 1")
        .expect("record for article 1");
    assert_eq!(sport.category.as_deref(), Some("the-thao"));
    assert_eq!(sport.author, "Phóng viên");
    assert_eq!(sport.content, "Mở đầu.\nKết thúc.");

    let cached = UrlCache::new(&config.output.url_cache)
        .load()
        .expect("cache readable")
        .expect("cache written");
    assert_eq!(cached.len(), 4);
}

#[tokio::test]
async fn test_max_pagination_bounds_listing_fetches() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().expect("temp dir");

    serve(&mock_server, "/", home_page(&["/xa-hoi.htm"]), 1).await;
    serve(
        &mock_server,
        "/xa-hoi.htm",
        listing_page(&["/xa-hoi/a.htm"], Some("/xa-hoi/trang-2.htm")),
        1,
    )
    .await;
    serve(
        &mock_server,
        "/xa-hoi/trang-2.htm",
        listing_page(&["/xa-hoi/b.htm"], Some("/xa-hoi/trang-3.htm")),
        1,
    )
    .await;
    // Beyond the limit: must never be requested
    serve(
        &mock_server,
        "/xa-hoi/trang-3.htm",
        listing_page(&["/xa-hoi/c.htm"], None),
        0,
    )
    .await;

    let config = create_test_config(&mock_server.uri(), &cache_dir, 2);
    let site = Arc::new(SelectorSite::from_config(&config).expect("site"));
    let coordinator =
        Coordinator::new(site, CrawlOptions::from_config(&config.crawler)).expect("coordinator");

    let links = coordinator.collect_links().await.expect("links");

    let base = mock_server.uri();
    assert_eq!(
        links,
        vec![format!("{}/xa-hoi/a.htm", base), format!("{}/xa-hoi/b.htm", base)]
    );
}

#[tokio::test]
async fn test_pagination_stops_when_next_link_missing() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().expect("temp dir");

    serve(&mock_server, "/", home_page(&["/suc-khoe.htm"]), 1).await;
    serve(
        &mock_server,
        "/suc-khoe.htm",
        listing_page(&["/suc-khoe/a.htm", "/suc-khoe/b.htm"], None),
        1,
    )
    .await;

    let config = create_test_config(&mock_server.uri(), &cache_dir, 10);
    let site = Arc::new(SelectorSite::from_config(&config).expect("site"));
    let coordinator =
        Coordinator::new(site, CrawlOptions::from_config(&config.crawler)).expect("coordinator");

    let links = coordinator.collect_links().await.expect("links");
    assert_eq!(links.len(), 2);
}

#[tokio::test]
async fn test_broken_articles_do_not_abort_the_run() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().expect("temp dir");

    serve(&mock_server, "/", home_page(&["/giai-tri.htm"]), 1).await;
    serve(
        &mock_server,
        "/giai-tri.htm",
        listing_page(
            &["/giai-tri/ok.htm", "/giai-tri/missing.htm", "/giai-tri/shapeless.htm"],
            None,
        ),
        1,
    )
    .await;
    serve(&mock_server, "/giai-tri/ok.htm", article_page("Ổn"), 1).await;
    serve(
        &mock_server,
        "/giai-tri/shapeless.htm",
        "<html><body><p>No article here</p></body></html>".to_string(),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/giai-tri/missing.htm"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &cache_dir, 1);
    let report = run_crawl(&config, PipelineMode::Cooperative, true, CancellationToken::new())
        .await
        .expect("crawl should succeed");

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.stats.succeeded, 1);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.skipped, 1);
    assert!(report.queue.is_drained());
}

#[tokio::test]
async fn test_cached_urls_skip_discovery() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().expect("temp dir");

    serve(&mock_server, "/", home_page(&[]), 0).await;
    serve(&mock_server, "/phap-luat/a.htm", article_page("Luật"), 1).await;

    let config = create_test_config(&mock_server.uri(), &cache_dir, 1);
    UrlCache::new(&config.output.url_cache)
        .save(&[format!("{}/phap-luat/a.htm", mock_server.uri())])
        .expect("cache write");

    let report = run_crawl(&config, PipelineMode::Sequential, false, CancellationToken::new())
        .await
        .expect("crawl should succeed");

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].title, "Luật");
}

#[tokio::test]
async fn test_unreachable_home_page_is_fatal() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().expect("temp dir");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &cache_dir, 1);
    let result = run_crawl(&config, PipelineMode::Threaded, true, CancellationToken::new()).await;

    assert!(matches!(result, Err(CrawlError::Discovery { .. })));
}
