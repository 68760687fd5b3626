//! Integration tests against mock HTTP servers

mod crawl_tests;
mod fetcher_tests;
