use crate::model::Target;
use serde::Deserialize;
use std::time::Duration;

/// Protocol name of the default catalog crawl action
pub const DEFAULT_PROTOCOL: &str = "dataspace-protocol-http";

/// Main configuration structure for fedcat
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

/// Crawl scheduling and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Global switch; when false no cycle is ever started
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of crawlers that may fetch concurrently
    #[serde(rename = "num-crawlers", default = "default_num_crawlers")]
    pub num_crawlers: u32,

    /// Time between two crawl cycles (seconds)
    #[serde(rename = "period-seconds", default = "default_period_seconds")]
    pub period_seconds: u64,

    /// Delay before the first cycle (seconds); randomized when absent
    #[serde(rename = "initial-delay-seconds", default)]
    pub initial_delay_seconds: Option<u64>,

    /// How often a failing target is retried within one cycle
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed part of the delay before a retry (seconds)
    #[serde(rename = "retry-delay-base-seconds", default = "default_retry_delay_base")]
    pub retry_delay_base_seconds: u64,

    /// Upper bound of the random part of the delay before a retry (seconds)
    #[serde(rename = "retry-delay-jitter-seconds", default = "default_retry_delay_jitter")]
    pub retry_delay_jitter_seconds: u64,
}

/// Catalog fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Number of datasets requested per page
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Protocol name the HTTP crawl action is registered under
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "request-timeout-seconds", default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(rename = "connect-timeout-seconds", default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Bearer credential attached to every catalog request
    #[serde(rename = "auth-token", default)]
    pub auth_token: Option<String>,
}

/// Which catalog cache backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

/// Catalog cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: CacheBackend,

    /// Path to the SQLite database file (sqlite backend only)
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// Identity of the node running the crawler
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Targets with this id are never crawled
    #[serde(rename = "self-id", default)]
    pub self_id: Option<String>,
}

/// A statically configured crawl target
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub id: String,
    pub url: String,
    #[serde(default = "default_protocols")]
    pub protocols: Vec<String>,
}

impl CrawlerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }

    pub fn initial_delay(&self) -> Option<Duration> {
        self.initial_delay_seconds.map(Duration::from_secs)
    }

    pub fn retry_delay_base(&self) -> Duration {
        Duration::from_secs(self.retry_delay_base_seconds)
    }

    pub fn retry_delay_jitter(&self) -> Duration {
        Duration::from_secs(self.retry_delay_jitter_seconds)
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl TargetEntry {
    pub fn to_target(&self) -> Target {
        Target::new(self.id.clone(), self.url.clone(), self.protocols.clone())
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            num_crawlers: default_num_crawlers(),
            period_seconds: default_period_seconds(),
            initial_delay_seconds: None,
            max_retries: default_max_retries(),
            retry_delay_base_seconds: default_retry_delay_base(),
            retry_delay_jitter_seconds: default_retry_delay_jitter(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            protocol: default_protocol(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            auth_token: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_path: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_num_crawlers() -> u32 {
    2
}

fn default_period_seconds() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_base() -> u64 {
    5
}

fn default_retry_delay_jitter() -> u64 {
    20
}

fn default_batch_size() -> usize {
    100
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_protocols() -> Vec<String> {
    vec![DEFAULT_PROTOCOL.to_string()]
}

fn default_user_agent() -> String {
    format!("fedcat/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_backend() -> CacheBackend {
    CacheBackend::Memory
}
