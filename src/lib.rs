//! Fedcat: a federated catalog crawler
//!
//! This crate periodically crawls a directory of remote nodes, fetches each
//! node's (paginated, possibly nested) catalog and keeps the results in a
//! queryable cache that expires entries which were not refreshed during the
//! last crawl cycle.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod directory;
pub mod fetch;
pub mod model;
pub mod storage;

use thiserror::Error;

/// Main error type for fedcat operations
#[derive(Debug, Error)]
pub enum FedcatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP {status} returned by {url}")]
    Http { url: String, status: u16 },

    #[error("Transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to decode catalog: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Crawl action panicked: {0}")]
    ActionPanicked(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for fedcat operations
pub type Result<T> = std::result::Result<T, FedcatError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CatalogCache, CatalogQueryService, InMemoryCatalogCache, QuerySpec};
pub use config::Config;
pub use crawler::{ActionRegistry, CrawlAction, ExecutionManager, ExecutionPlan, RecurringExecutionPlan};
pub use directory::{InMemoryTargetDirectory, TargetDirectory};
pub use model::{Catalog, DataService, Dataset, DatasetNode, Distribution, Target, WorkItem};
