//! A single crawler: runs one crawl attempt and reports its outcome
//!
//! Every attempt ends in exactly one callback. A successful response goes to
//! the success handler. An error result, a failed future or a panic inside
//! the action go to the error handler, after the failure has been recorded
//! on the work item.

use crate::crawler::action::CrawlAction;
use crate::model::{UpdateResponse, WorkItem};
use crate::{FedcatError, Result};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

/// Consumes the response of a successful crawl
///
/// Handlers deal with their own failures; the crawl itself already succeeded.
pub type SuccessHandler = Arc<dyn Fn(UpdateResponse) + Send + Sync>;

/// Observes a work item after a failed attempt has been recorded on it
pub type ErrorHandler = Arc<dyn Fn(&WorkItem) + Send + Sync>;

/// Runs crawl actions and funnels their outcomes into two handlers
pub struct Crawler {
    id: String,
    on_success: SuccessHandler,
    on_error: ErrorHandler,
}

impl Crawler {
    pub fn new(on_success: SuccessHandler, on_error: ErrorHandler) -> Self {
        Self {
            id: format!("Crawler-{}", Uuid::new_v4()),
            on_success,
            on_error,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs one attempt of `action` for `item`
    ///
    /// # Arguments
    ///
    /// * `item` - The work item; a failure message is appended to it on error
    /// * `action` - The action selected for the item's protocol
    ///
    /// # Returns
    ///
    /// * `Ok(UpdateResponse)` - The action succeeded; the success handler has run
    /// * `Err(FedcatError)` - The attempt failed; the error handler has run
    pub async fn run(&self, item: &mut WorkItem, action: &dyn CrawlAction) -> Result<UpdateResponse> {
        tracing::debug!("{} processing {}", self.id, item);

        match self.attempt(item, action).await {
            Ok(response) => {
                (self.on_success)(response.clone());
                Ok(response)
            }
            Err(e) => {
                tracing::debug!("{} failed {}: {}", self.id, item.target_id(), e);
                item.record_error(e.to_string());
                (self.on_error)(item);
                Err(e)
            }
        }
    }

    async fn attempt(&self, item: &WorkItem, action: &dyn CrawlAction) -> Result<UpdateResponse> {
        let request = item.to_request();

        // a panic may happen while building the future or while polling it
        let future = std::panic::catch_unwind(AssertUnwindSafe(|| action.apply(request)))
            .map_err(|payload| FedcatError::ActionPanicked(panic_message(payload)))?;

        AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .map_err(|payload| FedcatError::ActionPanicked(panic_message(payload)))?
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
