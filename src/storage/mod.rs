//! Storage module for persisting crawl data
//!
//! The only persisted state is the list of discovered article URLs, kept as
//! JSON so a later run can skip link discovery.

mod url_cache;

pub use url_cache::UrlCache;
