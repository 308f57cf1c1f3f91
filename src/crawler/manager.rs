//! Execution manager: drives one crawl cycle over the target directory
//!
//! A cycle runs the pre-cycle hook, reads every target from the directory,
//! turns the crawlable ones into work items and runs them on the crawler
//! pool. A failed item is retried with a jittered delay until its retry cap
//! is exceeded. The post-cycle hook runs once every item has either
//! succeeded or been given up on.

use crate::crawler::action::{ActionRegistry, CrawlAction};
use crate::crawler::plan::{CycleTask, ExecutionPlan};
use crate::crawler::pool::CrawlerPool;
use crate::crawler::retry::{RetryDecision, RetryPolicy};
use crate::crawler::runner::{panic_message, Crawler, ErrorHandler, SuccessHandler};
use crate::directory::TargetDirectory;
use crate::model::{Target, UpdateResponse, WorkItem};
use crate::{ConfigError, FedcatError, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Hook run before or after a crawl cycle
pub type CycleHook = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Decides whether a target takes part in crawling
pub type NodeFilter = Arc<dyn Fn(&Target) -> bool + Send + Sync>;

/// Summary of one crawl cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Targets read from the directory
    pub targets: usize,

    /// Targets excluded by self id, node filter or missing protocol support
    pub skipped: usize,

    /// Work items whose catalog was fetched
    pub succeeded: usize,

    /// Work items dropped after exhausting their retries
    pub failed: usize,

    pub elapsed: Duration,
}

/// How a single work item ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainOutcome {
    Succeeded,
    Failed,
}

/// Orchestrates crawl cycles
pub struct ExecutionManager {
    directory: Arc<dyn TargetDirectory>,
    registry: Arc<ActionRegistry>,
    pool: Arc<CrawlerPool>,
    retry: RetryPolicy,
    pre_task: Option<CycleHook>,
    post_task: Option<CycleHook>,
    node_filter: NodeFilter,
    self_id: Option<String>,
    enabled: bool,
}

impl ExecutionManager {
    pub fn builder(
        directory: Arc<dyn TargetDirectory>,
        registry: Arc<ActionRegistry>,
    ) -> ExecutionManagerBuilder {
        ExecutionManagerBuilder::new(directory, registry)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn num_crawlers(&self) -> usize {
        self.pool.size()
    }

    /// Hands the crawl cycle to an execution plan
    ///
    /// When execution is disabled this only logs a warning; the plan is not
    /// started and the directory is never read.
    pub fn execute_plan(self: &Arc<Self>, plan: &dyn ExecutionPlan) {
        if !self.enabled {
            tracing::warn!("Crawler execution is disabled, not scheduling any crawl cycles");
            return;
        }

        let manager = Arc::clone(self);
        let task: CycleTask = Arc::new(move || {
            let manager = Arc::clone(&manager);
            async move {
                manager.run_cycle().await;
                Ok::<(), FedcatError>(())
            }
            .boxed()
        });

        tracing::info!(
            "Scheduling crawl cycles with {} crawlers",
            self.pool.size()
        );
        plan.run(task);
    }

    /// Stops a plan previously started with [`Self::execute_plan`]
    ///
    /// Like `execute_plan`, this does nothing but log when execution is disabled.
    pub async fn shutdown_plan(&self, plan: &dyn ExecutionPlan) {
        if !self.enabled {
            tracing::warn!("Crawler execution is disabled, no crawl plan to shut down");
            return;
        }
        plan.stop().await;
    }

    /// Runs one complete crawl cycle
    ///
    /// A disabled manager returns an empty report without running hooks or
    /// reading the directory.
    ///
    /// # Returns
    ///
    /// A [`CycleReport`] describing how many targets were crawled, skipped,
    /// succeeded and failed.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        if !self.enabled {
            tracing::warn!("Crawler execution is disabled, not running a crawl cycle");
            return report;
        }

        run_hook("pre-cycle", self.pre_task.as_ref());

        let targets = match self.directory.get_all() {
            Ok(targets) => targets,
            Err(e) => {
                // keep the cache intact rather than sweeping every entry
                tracing::error!("Could not read target directory, skipping cycle: {}", e);
                report.elapsed = started.elapsed();
                return report;
            }
        };
        report.targets = targets.len();

        let mut chains = JoinSet::new();
        for target in targets {
            let Some((item, action)) = self.plan_work_item(&target) else {
                report.skipped += 1;
                continue;
            };

            let pool = Arc::clone(&self.pool);
            let retry = self.retry;
            chains.spawn(run_chain(pool, action, retry, item));
        }

        tracing::info!(
            "Crawl cycle started: {} work items, {} targets skipped",
            chains.len(),
            report.skipped
        );

        while let Some(joined) = chains.join_next().await {
            match joined {
                Ok(ChainOutcome::Succeeded) => report.succeeded += 1,
                Ok(ChainOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!("Work item task aborted: {}", e);
                    report.failed += 1;
                }
            }
        }

        run_hook("post-cycle", self.post_task.as_ref());

        report.elapsed = started.elapsed();
        tracing::info!(
            "Crawl cycle finished in {:?}: {} succeeded, {} failed, {} skipped",
            report.elapsed,
            report.succeeded,
            report.failed,
            report.skipped
        );
        report
    }

    /// Turns a target into a work item, or `None` if it is not crawled
    fn plan_work_item(&self, target: &Target) -> Option<(WorkItem, Arc<dyn CrawlAction>)> {
        if self.self_id.as_deref() == Some(target.id.as_str()) {
            tracing::debug!("Skipping own node {}", target.id);
            return None;
        }

        if !(self.node_filter)(target) {
            tracing::debug!("Node filter excluded {}", target.id);
            return None;
        }

        let protocol = match self.registry.select_protocol(&target.supported_protocols) {
            Ok(Some(protocol)) => protocol,
            Ok(None) => {
                tracing::warn!(
                    "No crawl action supports any protocol of node {} ({:?}), skipping",
                    target.id,
                    target.supported_protocols
                );
                return None;
            }
            Err(e) => {
                tracing::error!("Protocol lookup failed for node {}: {}", target.id, e);
                return None;
            }
        };

        let action = match self.registry.find_for_protocol(protocol) {
            Ok(actions) => actions.into_iter().next()?,
            Err(e) => {
                tracing::error!("Action lookup failed for node {}: {}", target.id, e);
                return None;
            }
        };

        Some((WorkItem::new(&target.id, &target.url, protocol), action))
    }
}

/// Runs a work item until it succeeds or its retries are used up
async fn run_chain(
    pool: Arc<CrawlerPool>,
    action: Arc<dyn CrawlAction>,
    retry: RetryPolicy,
    mut item: WorkItem,
) -> ChainOutcome {
    loop {
        let attempt = {
            let crawler = match pool.acquire().await {
                Ok(crawler) => crawler,
                Err(e) => {
                    tracing::error!("No crawler available for {}: {}", item, e);
                    return ChainOutcome::Failed;
                }
            };
            crawler.run(&mut item, action.as_ref()).await
        };

        if attempt.is_ok() {
            return ChainOutcome::Succeeded;
        }

        match retry.decide(item.errors().len()) {
            RetryDecision::Retry(delay) => {
                tracing::debug!("Retrying {} in {:?}", item, delay);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp => {
                tracing::error!(
                    "{} permanently failed after {} attempts, last error: {}",
                    item,
                    item.errors().len(),
                    item.errors().last().map(String::as_str).unwrap_or("unknown")
                );
                return ChainOutcome::Failed;
            }
        }
    }
}

/// Runs a hook, logging but never propagating its failure
fn run_hook(name: &str, hook: Option<&CycleHook>) {
    let Some(hook) = hook else {
        return;
    };

    match std::panic::catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(Ok(())) => tracing::debug!("{} task completed", name),
        Ok(Err(e)) => tracing::error!("{} task failed: {}", name, e),
        Err(payload) => tracing::error!("{} task panicked: {}", name, panic_message(payload)),
    }
}

/// Builder for [`ExecutionManager`]
pub struct ExecutionManagerBuilder {
    directory: Arc<dyn TargetDirectory>,
    registry: Arc<ActionRegistry>,
    on_success: Option<SuccessHandler>,
    num_crawlers: usize,
    retry: RetryPolicy,
    pre_task: Option<CycleHook>,
    post_task: Option<CycleHook>,
    node_filter: Option<NodeFilter>,
    self_id: Option<String>,
    enabled: bool,
}

impl ExecutionManagerBuilder {
    fn new(directory: Arc<dyn TargetDirectory>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            directory,
            registry,
            on_success: None,
            num_crawlers: 2,
            retry: RetryPolicy::default(),
            pre_task: None,
            post_task: None,
            node_filter: None,
            self_id: None,
            enabled: true,
        }
    }

    pub fn on_success(mut self, handler: SuccessHandler) -> Self {
        self.on_success = Some(handler);
        self
    }

    pub fn num_crawlers(mut self, num_crawlers: usize) -> Self {
        self.num_crawlers = num_crawlers;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pre_task(mut self, hook: CycleHook) -> Self {
        self.pre_task = Some(hook);
        self
    }

    pub fn post_task(mut self, hook: CycleHook) -> Self {
        self.post_task = Some(hook);
        self
    }

    pub fn node_filter(mut self, filter: NodeFilter) -> Self {
        self.node_filter = Some(filter);
        self
    }

    pub fn self_id(mut self, self_id: Option<String>) -> Self {
        self.self_id = self_id;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> Result<ExecutionManager> {
        if self.num_crawlers == 0 {
            return Err(FedcatError::Config(ConfigError::Validation(
                "the crawler pool needs at least one crawler".to_string(),
            )));
        }

        let on_success: SuccessHandler = match self.on_success {
            Some(handler) => handler,
            None => Arc::new(|response: UpdateResponse| {
                tracing::debug!("Fetched catalog {} from {}", response.catalog.id, response.source);
            }),
        };
        let on_error: ErrorHandler = Arc::new(|item: &WorkItem| {
            tracing::warn!(
                "Crawl attempt failed for {}: {}",
                item,
                item.errors().last().map(String::as_str).unwrap_or("unknown error")
            );
        });

        let crawlers = (0..self.num_crawlers)
            .map(|_| Crawler::new(Arc::clone(&on_success), Arc::clone(&on_error)))
            .collect();

        Ok(ExecutionManager {
            directory: self.directory,
            registry: self.registry,
            pool: Arc::new(CrawlerPool::new(crawlers)),
            retry: self.retry,
            pre_task: self.pre_task,
            post_task: self.post_task,
            node_filter: match self.node_filter {
                Some(filter) => filter,
                None => Arc::new(|_: &Target| true),
            },
            self_id: self.self_id,
            enabled: self.enabled,
        })
    }
}
