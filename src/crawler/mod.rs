//! Crawl execution engine
//!
//! This module contains the machinery that turns the target directory into
//! refreshed cache entries:
//! - `action`: crawl actions and the protocol registry
//! - `runner`: a single crawler that funnels every outcome into two handlers
//! - `pool`: the bounded set of crawlers shared by all work items
//! - `retry`: the retry cap and jittered delay
//! - `manager`: one crawl cycle from pre-cycle hook to post-cycle hook
//! - `plan`: when cycles run

mod action;
mod manager;
mod plan;
mod pool;
mod retry;
mod runner;

pub use action::{ActionRegistry, CrawlAction};
pub use manager::{CycleHook, CycleReport, ExecutionManager, ExecutionManagerBuilder, NodeFilter};
pub use plan::{
    CycleTask, ExecutionPlan, RecurringExecutionPlan, DEFAULT_SHUTDOWN_TIMEOUT, LOW_PERIOD,
    MIN_PERIOD,
};
pub use pool::{CrawlerLease, CrawlerPool};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{Crawler, ErrorHandler, SuccessHandler};

use crate::cache::{persist_response, CatalogCache};
use crate::config::Config;
use crate::directory::TargetDirectory;
use crate::model::UpdateResponse;
use crate::Result;
use std::sync::Arc;

/// Wires an execution manager to a catalog cache
///
/// The manager marks every cache entry as expired before a cycle, stores
/// each fetched catalog under its source URL and sweeps the entries that
/// were not refreshed once the cycle is over.
///
/// # Arguments
///
/// * `config` - Crawler settings (pool size, retries, own node id)
/// * `directory` - Where the targets come from
/// * `registry` - Crawl actions by protocol
/// * `cache` - Where fetched catalogs go
///
/// # Returns
///
/// * `Ok(ExecutionManager)` - A manager ready to be handed a plan
/// * `Err(FedcatError)` - The settings were rejected
pub fn build_execution_manager(
    config: &Config,
    directory: Arc<dyn TargetDirectory>,
    registry: Arc<ActionRegistry>,
    cache: Arc<dyn CatalogCache>,
) -> Result<ExecutionManager> {
    let persist_cache = Arc::clone(&cache);
    let on_success: SuccessHandler = Arc::new(move |response: UpdateResponse| {
        let source = response.source.clone();
        match persist_response(persist_cache.as_ref(), response) {
            Ok(()) => tracing::info!("Stored catalog from {}", source),
            Err(e) => tracing::error!("Failed to store catalog from {}: {}", source, e),
        }
    });

    let expire_cache = Arc::clone(&cache);
    let pre_task: CycleHook = Arc::new(move || {
        expire_cache.expire_all()?;
        Ok(())
    });

    let sweep_cache = cache;
    let post_task: CycleHook = Arc::new(move || {
        let removed = sweep_cache.delete_expired()?;
        tracing::info!("Removed {} stale catalogs from the cache", removed);
        Ok(())
    });

    ExecutionManager::builder(directory, registry)
        .enabled(config.crawler.enabled)
        .num_crawlers(config.crawler.num_crawlers as usize)
        .retry_policy(RetryPolicy::from_config(&config.crawler))
        .self_id(config.node.self_id.clone())
        .on_success(on_success)
        .pre_task(pre_task)
        .post_task(post_task)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryCatalogCache, QuerySpec};
    use crate::directory::InMemoryTargetDirectory;
    use crate::model::{Catalog, Target, UpdateRequest, PROPERTY_ORIGINATOR};
    use crate::FedcatError;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct StaticAction;

    impl CrawlAction for StaticAction {
        fn apply(&self, request: UpdateRequest) -> BoxFuture<'_, Result<UpdateResponse>> {
            async move {
                if request.node_id == "down" {
                    return Err(FedcatError::Http {
                        url: request.node_url,
                        status: 502,
                    });
                }
                let catalog = Catalog::new(format!("{}-catalog", request.node_id));
                Ok(UpdateResponse::new(request.node_url, catalog))
            }
            .boxed()
        }
    }

    fn target(id: &str) -> Target {
        Target::new(id, format!("https://{}.example", id), vec!["dsp".to_string()])
    }

    #[tokio::test]
    async fn test_cycle_refreshes_and_sweeps_cache() {
        let mut config = Config::default();
        config.crawler.max_retries = 1;
        config.crawler.retry_delay_base_seconds = 0;
        config.crawler.retry_delay_jitter_seconds = 0;

        let cache = Arc::new(InMemoryCatalogCache::new());
        // left over from a node that has since left the directory
        cache
            .save(Catalog::new("gone").with_property(PROPERTY_ORIGINATOR, "https://gone.example"))
            .unwrap();
        // a node that is down keeps nothing either
        cache
            .save(Catalog::new("old").with_property(PROPERTY_ORIGINATOR, "https://down.example"))
            .unwrap();

        let directory = Arc::new(InMemoryTargetDirectory::with_targets(vec![
            target("up"),
            target("down"),
        ]));
        let registry = Arc::new(ActionRegistry::new());
        registry.register("dsp", Arc::new(StaticAction)).unwrap();

        let manager = build_execution_manager(&config, directory, registry, cache.clone()).unwrap();
        let report = manager.run_cycle().await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let cached = cache.query(&QuerySpec::all()).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "up-catalog");
        assert_eq!(cached[0].originator().as_deref(), Some("https://up.example"));
    }

    #[test]
    fn test_disabled_config_builds_disabled_manager() {
        let mut config = Config::default();
        config.crawler.enabled = false;

        let manager = build_execution_manager(
            &config,
            Arc::new(InMemoryTargetDirectory::new()),
            Arc::new(ActionRegistry::new()),
            Arc::new(InMemoryCatalogCache::new()),
        )
        .unwrap();

        assert!(!manager.is_enabled());
        assert_eq!(manager.num_crawlers(), config.crawler.num_crawlers as usize);
    }
}
