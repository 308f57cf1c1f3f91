use crate::config::types::{
    CacheBackend, CacheConfig, Config, CrawlerConfig, FetchConfig, TargetEntry, TransportConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_transport_config(&config.transport)?;
    validate_cache_config(&config.cache)?;
    validate_targets(&config.targets)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.num_crawlers < 1 || config.num_crawlers > 100 {
        return Err(ConfigError::Validation(format!(
            "num_crawlers must be between 1 and 100, got {}",
            config.num_crawlers
        )));
    }

    // very short periods are only warned about when the plan is created
    if config.period_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "period_seconds must be >= 1, got {}",
            config.period_seconds
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.protocol.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch protocol cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_seconds must be >= 1, got {}",
            config.request_timeout_seconds
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.backend == CacheBackend::Sqlite
        && config.database_path.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::Validation(
            "database_path is required for the sqlite cache backend".to_string(),
        ));
    }

    Ok(())
}

/// Validates the statically configured targets
fn validate_targets(targets: &[TargetEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for target in targets {
        if target.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "target id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(target.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate target id '{}'",
                target.id
            )));
        }

        let url = Url::parse(&target.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid URL for target '{}': {}", target.id, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "Target '{}' must use http or https, got '{}'",
                target.id,
                url.scheme()
            )));
        }

        if target.protocols.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Target '{}' must list at least one protocol",
                target.id
            )));
        }
    }

    Ok(())
}
