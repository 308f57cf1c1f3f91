//! Fixed-size pool of crawlers
//!
//! The number of crawlers bounds how many crawl attempts run at once. A
//! crawler is leased for one attempt and returned when the lease drops, so
//! retries and new work items queue on the same permits.

use crate::crawler::runner::Crawler;
use crate::{FedcatError, Result};
use std::ops::Deref;
use std::sync::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};

/// A bounded set of crawler instances
pub struct CrawlerPool {
    crawlers: Vec<Crawler>,
    idle: Mutex<Vec<usize>>,
    permits: Semaphore,
}

impl CrawlerPool {
    /// Creates a pool holding the given crawlers
    pub fn new(crawlers: Vec<Crawler>) -> Self {
        let size = crawlers.len();
        Self {
            crawlers,
            idle: Mutex::new((0..size).rev().collect()),
            permits: Semaphore::new(size),
        }
    }

    /// Total number of crawlers, leased or not
    pub fn size(&self) -> usize {
        self.crawlers.len()
    }

    /// Number of crawlers currently waiting for work
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free crawler and leases it
    pub async fn acquire(&self) -> Result<CrawlerLease<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FedcatError::LockPoisoned("crawler pool closed"))?;

        let index = self
            .idle
            .lock()
            .map_err(|_| FedcatError::LockPoisoned("crawler pool"))?
            .pop()
            .ok_or(FedcatError::LockPoisoned("crawler pool out of sync"))?;

        Ok(CrawlerLease {
            pool: self,
            index,
            _permit: permit,
        })
    }
}

/// A crawler on loan from a [`CrawlerPool`]
pub struct CrawlerLease<'a> {
    pool: &'a CrawlerPool,
    index: usize,
    // released after the index is back in the idle list
    _permit: SemaphorePermit<'a>,
}

impl Deref for CrawlerLease<'_> {
    type Target = Crawler;

    fn deref(&self) -> &Crawler {
        &self.pool.crawlers[self.index]
    }
}

impl Drop for CrawlerLease<'_> {
    fn drop(&mut self) {
        match self.pool.idle.lock() {
            Ok(mut idle) => idle.push(self.index),
            Err(_) => tracing::error!(
                "Crawler pool lock poisoned, retiring {}",
                self.pool.crawlers[self.index].id()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UpdateResponse, WorkItem};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn pool(size: usize) -> CrawlerPool {
        let crawlers = (0..size)
            .map(|_| Crawler::new(Arc::new(|_: UpdateResponse| {}), Arc::new(|_: &WorkItem| {})))
            .collect();
        CrawlerPool::new(crawlers)
    }

    #[tokio::test]
    async fn test_lease_returns_crawler_on_drop() {
        let pool = pool(2);
        assert_eq!(pool.available(), 2);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(pool.available(), 1);
        drop(second);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_acquire_waits_when_exhausted() {
        let pool = Arc::new(pool(1));
        let lease = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|l| l.id().to_string()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        let leased_id = lease.id().to_string();
        drop(lease);

        let reused_id = waiter.await.unwrap().unwrap();
        assert_eq!(reused_id, leased_id);
    }

    #[tokio::test]
    async fn test_all_crawlers_are_distinct() {
        let pool = pool(4);
        let mut leases = Vec::new();
        for _ in 0..4 {
            leases.push(pool.acquire().await.unwrap());
        }

        let ids: HashSet<_> = leases.iter().map(|l| l.id().to_string()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(pool.size(), 4);
    }
}
