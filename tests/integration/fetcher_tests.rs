//! Fetcher behaviour against a real HTTP server
//!
//! Status handling, retry counts and per-attempt timeouts.

use dantri_crawler::config::FetcherConfig;
use dantri_crawler::crawler::Fetcher;
use dantri_crawler::FetchError;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_config(retry_times: u32) -> FetcherConfig {
    FetcherConfig {
        retry_times,
        retry_backoff: 10,
        request_timeout: 2_000,
        user_agents: vec!["TestAgent/1.0".to_string()],
        ..FetcherConfig::default()
    }
}

#[tokio::test]
async fn test_fetch_ok_returns_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bai-viet.htm"))
        .and(header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(3)).expect("fetcher");
    let url = format!("{}/bai-viet.htm", mock_server.uri());

    let fetched = fetcher.fetch(&url).await.expect("fetch should succeed");
    assert_eq!(fetched.value, "<html>ok</html>");
    assert_eq!(fetched.attempts, 1);
    assert_eq!(fetched.retries(), 0);
}

#[tokio::test]
async fn test_server_error_exhausts_retry_budget() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(2)).expect("fetcher");
    let url = format!("{}/flaky", mock_server.uri());

    let failure = fetcher.fetch(&url).await.expect_err("fetch should fail");
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.value, FetchError::Status { url, status: 500 });
}

#[tokio::test]
async fn test_non_ok_success_status_is_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(0)).expect("fetcher");
    let url = format!("{}/empty", mock_server.uri());

    let failure = fetcher.fetch(&url).await.expect_err("204 is not a success");
    assert!(matches!(failure.value, FetchError::Status { status: 204, .. }));
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(200).set_body_string("back"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(3)).expect("fetcher");
    let url = format!("{}/recovering", mock_server.uri());

    let fetched = fetcher.fetch(&url).await.expect("third attempt succeeds");
    assert_eq!(fetched.value, "back");
    assert_eq!(fetched.attempts, 3);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&mock_server)
        .await;

    let config = FetcherConfig {
        request_timeout: 100,
        ..fetcher_config(1)
    };
    let fetcher = Fetcher::new(&config).expect("fetcher");
    let url = format!("{}/slow", mock_server.uri());

    let failure = fetcher.fetch(&url).await.expect_err("should time out");
    assert_eq!(failure.attempts, 2);
    assert_eq!(failure.value, FetchError::Timeout { url });
}

#[tokio::test]
async fn test_configured_headers_are_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("accept-language", "vi-VN"))
        .respond_with(ResponseTemplate::new(200).set_body_string("xin chào"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = fetcher_config(0);
    config
        .headers
        .insert("Accept-Language".to_string(), "vi-VN".to_string());
    let fetcher = Fetcher::new(&config).expect("fetcher");

    let fetched = fetcher
        .fetch(&mock_server.uri())
        .await
        .expect("fetch should succeed");
    assert_eq!(fetched.value, "xin chào");
}
