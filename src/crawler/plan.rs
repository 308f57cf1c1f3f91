//! Execution plans decide when crawl cycles run
//!
//! The recurring plan waits for an initial delay and then runs the cycle
//! task at a fixed period. Cycles never overlap: a tick that falls due while
//! a cycle is still running is delayed until it finishes.

use crate::crawler::runner::panic_message;
use crate::config::CrawlerConfig;
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periods below this are accepted but logged as a warning
pub const LOW_PERIOD: Duration = Duration::from_secs(10);

/// Shortest period a plan will tick at; shorter periods are raised to it
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// How long `stop` waits for a running cycle before aborting it
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// One crawl cycle, ready to be started any number of times
pub type CycleTask = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Schedules a cycle task
#[async_trait]
pub trait ExecutionPlan: Send + Sync {
    /// Starts running `task` according to the plan
    fn run(&self, task: CycleTask);

    /// Stops scheduling and waits for a running cycle to finish
    async fn stop(&self);
}

enum PlanState {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Runs the cycle task at a fixed period
pub struct RecurringExecutionPlan {
    period: Duration,
    initial_delay: Duration,
    shutdown_timeout: Duration,
    state: Mutex<PlanState>,
}

impl RecurringExecutionPlan {
    /// Creates a plan
    ///
    /// # Arguments
    ///
    /// * `period` - Time between the starts of two cycles
    /// * `initial_delay` - Wait before the first cycle; random 10..100 s if `None`
    ///
    /// A period below [`MIN_PERIOD`] is raised to it, since the schedule
    /// cannot tick at a zero interval.
    pub fn new(period: Duration, initial_delay: Option<Duration>) -> Self {
        let period = if period < MIN_PERIOD {
            tracing::warn!(
                "Crawl period of {:?} is not usable, using {:?} instead",
                period,
                MIN_PERIOD
            );
            MIN_PERIOD
        } else {
            period
        };

        if period < LOW_PERIOD {
            tracing::warn!(
                "Crawl period of {:?} is very low, remote nodes may be flooded with requests",
                period
            );
        }

        let initial_delay = initial_delay
            .unwrap_or_else(|| Duration::from_secs(rand::rng().random_range(10..100)));

        Self {
            period,
            initial_delay,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            state: Mutex::new(PlanState::Idle),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.period(), config.initial_delay())
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), PlanState::Running { .. })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PlanState> {
        // the state is a plain enum, a panic elsewhere cannot leave it torn
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ExecutionPlan for RecurringExecutionPlan {
    fn run(&self, task: CycleTask) {
        let mut state = self.lock_state();

        match *state {
            PlanState::Idle => {}
            PlanState::Running { .. } => {
                tracing::warn!("Execution plan is already running, ignoring");
                return;
            }
            PlanState::Stopped => {
                tracing::warn!("Execution plan was stopped and cannot be restarted");
                return;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Execution plan needs a Tokio runtime: {}", e);
                return;
            }
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(drive(
            task,
            cancel.clone(),
            self.period,
            self.initial_delay,
        ));

        tracing::info!(
            "Execution plan started: first cycle in {:?}, then every {:?}",
            self.initial_delay,
            self.period
        );
        *state = PlanState::Running { cancel, handle };
    }

    async fn stop(&self) {
        let previous = {
            let mut state = self.lock_state();
            if !matches!(*state, PlanState::Running { .. }) {
                return;
            }
            std::mem::replace(&mut *state, PlanState::Stopped)
        };

        let PlanState::Running { cancel, handle } = previous else {
            return;
        };

        cancel.cancel();
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(Ok(())) => tracing::info!("Execution plan stopped"),
            Ok(Err(e)) => tracing::warn!("Execution plan task ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Crawl cycle did not finish within {:?}, aborting it",
                    self.shutdown_timeout
                );
                abort.abort();
            }
        }
    }
}

/// The plan's background loop
async fn drive(
    task: CycleTask,
    cancel: CancellationToken,
    period: Duration,
    initial_delay: Duration,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(initial_delay) => {}
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        run_cycle_task(&task).await;
    }
}

/// Runs one cycle, containing any failure so the schedule survives it
async fn run_cycle_task(task: &CycleTask) {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| task())) {
        Ok(future) => future,
        Err(payload) => {
            tracing::error!("Crawl cycle panicked on start: {}", panic_message(payload));
            return;
        }
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Crawl cycle failed: {}", e),
        Err(payload) => tracing::error!("Crawl cycle panicked: {}", panic_message(payload)),
    }
}
