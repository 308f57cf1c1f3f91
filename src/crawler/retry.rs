//! Retry policy for failed work items
//!
//! A work item is retried while its error count does not exceed the cap, so
//! a cap of `n` allows `n + 1` attempts in total. Each retry waits a fixed
//! base delay plus a uniformly random jitter.

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

/// What to do with a work item after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),

    /// Drop the item for the rest of the cycle
    GiveUp,
}

/// Retry cap and delay distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter,
        }
    }

    /// Retries immediately, useful when delays would only slow tests down
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_delay_base(),
            config.retry_delay_jitter(),
        )
    }

    /// Decides the fate of an item that has failed `errors` times so far
    pub fn decide(&self, errors: usize) -> RetryDecision {
        if errors <= self.max_retries as usize {
            RetryDecision::Retry(self.next_delay())
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Samples a delay in `[base, base + jitter)`
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base_delay;
        }
        self.base_delay + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}
