//! Integration tests for fedcat
//!
//! These tests run real crawl cycles against wiremock servers speaking the
//! catalog request protocol.

mod catalog_crawl_tests;
mod config_tests;
