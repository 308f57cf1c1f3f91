//! Configuration module for fedcat
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use fedcat::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fedcat.toml")).unwrap();
//! println!("Crawling with {} crawlers", config.crawler.num_crawlers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheBackend, CacheConfig, Config, CrawlerConfig, FetchConfig, NodeConfig, TargetEntry,
    TransportConfig, DEFAULT_PROTOCOL,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
