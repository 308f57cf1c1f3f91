//! Crawl actions and the protocol registry
//!
//! A crawl action knows how to obtain one node's catalog over one protocol.
//! Actions are registered per protocol name; the execution manager picks the
//! first protocol a target supports that has at least one action registered.

use crate::model::{UpdateRequest, UpdateResponse};
use crate::{FedcatError, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Fetches a node's catalog for a single crawl attempt
///
/// Implementations may fail by returning an error from the future, by
/// returning an error future right away, or by panicking. The crawler treats
/// all three the same way.
pub trait CrawlAction: Send + Sync {
    fn apply(&self, request: UpdateRequest) -> BoxFuture<'_, Result<UpdateResponse>>;
}

impl<F> CrawlAction for F
where
    F: Fn(UpdateRequest) -> BoxFuture<'static, Result<UpdateResponse>> + Send + Sync,
{
    fn apply(&self, request: UpdateRequest) -> BoxFuture<'_, Result<UpdateResponse>> {
        self(request)
    }
}

/// Protocol name to crawl actions mapping
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Vec<Arc<dyn CrawlAction>>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action for a protocol
    pub fn register(&self, protocol: impl Into<String>, action: Arc<dyn CrawlAction>) -> Result<()> {
        self.actions
            .write()
            .map_err(|_| lock_error())?
            .entry(protocol.into())
            .or_default()
            .push(action);
        Ok(())
    }

    /// Removes a previously registered action
    ///
    /// Returns whether the action was found. The protocol disappears from the
    /// registry once its last action is removed.
    pub fn unregister(&self, protocol: &str, action: &Arc<dyn CrawlAction>) -> Result<bool> {
        let mut actions = self.actions.write().map_err(|_| lock_error())?;

        let Some(registered) = actions.get_mut(protocol) else {
            return Ok(false);
        };

        let before = registered.len();
        registered.retain(|existing| !Arc::ptr_eq(existing, action));
        let removed = registered.len() != before;

        if registered.is_empty() {
            actions.remove(protocol);
        }

        Ok(removed)
    }

    /// Returns the actions registered for a protocol
    pub fn find_for_protocol(&self, protocol: &str) -> Result<Vec<Arc<dyn CrawlAction>>> {
        let actions = self.actions.read().map_err(|_| lock_error())?;
        Ok(actions.get(protocol).cloned().unwrap_or_default())
    }

    /// Whether at least one action is registered for the protocol
    pub fn supports(&self, protocol: &str) -> Result<bool> {
        let actions = self.actions.read().map_err(|_| lock_error())?;
        Ok(actions.get(protocol).is_some_and(|list| !list.is_empty()))
    }

    /// Picks the first of `protocols` that has an action registered
    pub fn select_protocol<'a>(&self, protocols: &'a [String]) -> Result<Option<&'a str>> {
        for protocol in protocols {
            if self.supports(protocol)? {
                return Ok(Some(protocol.as_str()));
            }
        }
        Ok(None)
    }
}

fn lock_error() -> FedcatError {
    FedcatError::LockPoisoned("action registry")
}
