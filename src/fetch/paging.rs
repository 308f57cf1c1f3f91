//! Paging catalog fetcher
//!
//! A node's catalog is requested in batches. A page holding at least
//! `batch_size` datasets means more may follow, so the next range is
//! requested and merged in; a shorter page ends the walk. Once all pages of
//! a catalog are in, every nested sub-catalog that advertises an endpoint is
//! fetched the same way and put back in place of the stub, so the nesting
//! of the result mirrors the nesting published by the nodes.
//!
//! Recursion depth is bounded only by the remote data.

use crate::fetch::{CatalogDecoder, CatalogRequest, Transport};
use crate::model::{algebra, Catalog, DatasetNode};
use crate::{ConfigError, FedcatError, Result};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;

/// Fetches complete, expanded catalogs
#[derive(Clone)]
pub struct PagingCatalogFetcher {
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn CatalogDecoder>,
}

impl PagingCatalogFetcher {
    pub fn new(transport: Arc<dyn Transport>, decoder: Arc<dyn CatalogDecoder>) -> Self {
        Self { transport, decoder }
    }

    /// Fetches all pages starting at `from` and expands nested catalogs
    ///
    /// # Arguments
    ///
    /// * `request` - Target address, participant id and protocol
    /// * `from` - Index of the first dataset to request
    /// * `batch_size` - Number of datasets per request, at least 1
    ///
    /// # Returns
    ///
    /// * `Ok(Catalog)` - The assembled catalog
    /// * `Err(FedcatError)` - Any request or decode failed, including one for a sub-catalog
    pub fn fetch(
        &self,
        request: CatalogRequest,
        from: usize,
        batch_size: usize,
    ) -> BoxFuture<'_, Result<Catalog>> {
        async move {
            if batch_size == 0 {
                return Err(FedcatError::Config(ConfigError::Validation(
                    "batch size must be at least 1".to_string(),
                )));
            }

            let root = self.fetch_pages(&request, from, batch_size).await?;
            self.expand(root, &request, batch_size).await
        }
        .boxed()
    }

    async fn fetch_pages(
        &self,
        request: &CatalogRequest,
        from: usize,
        batch_size: usize,
    ) -> Result<Catalog> {
        let mut offset = from;
        let mut catalog = self.fetch_page(request, offset, batch_size).await?;
        let mut last_page_len = catalog.datasets.len();

        while last_page_len >= batch_size {
            offset += batch_size;
            tracing::debug!(
                "Fetching next batch from {} to {} at {}",
                offset,
                offset + batch_size,
                request.counterparty_address
            );

            let page = self.fetch_page(request, offset, batch_size).await?;
            last_page_len = page.datasets.len();
            catalog = algebra::merge(&catalog, &page);
        }

        Ok(catalog)
    }

    async fn fetch_page(
        &self,
        request: &CatalogRequest,
        from: usize,
        batch_size: usize,
    ) -> Result<Catalog> {
        let body = self.transport.dispatch(&request.page(from, batch_size)).await?;
        self.decoder.decode(&body)
    }

    /// Replaces every sub-catalog of `root` with its fully fetched version
    async fn expand(
        &self,
        root: Catalog,
        request: &CatalogRequest,
        batch_size: usize,
    ) -> Result<Catalog> {
        if !root.datasets.iter().any(DatasetNode::is_catalog) {
            return Ok(root);
        }

        let expansions = root.datasets.iter().map(|node| async move {
            match node {
                DatasetNode::Dataset(_) => Ok::<_, FedcatError>(Some(node.clone())),
                DatasetNode::Catalog(sub) => {
                    let Some(endpoint) = sub.first_endpoint() else {
                        tracing::warn!(
                            "Sub-catalog {} of {} has no data service endpoint, dropping it",
                            sub.id,
                            request.counterparty_address
                        );
                        return Ok(None);
                    };

                    let participant_id = sub
                        .participant_id
                        .clone()
                        .or_else(|| request.counterparty_id.clone());
                    let sub_request = request.redirect(endpoint, participant_id);

                    tracing::debug!("Expanding sub-catalog {} from {}", sub.id, endpoint);
                    let expanded = self.fetch(sub_request, 0, batch_size).await?;
                    Ok(Some(DatasetNode::Catalog(expanded)))
                }
            }
        });

        let datasets = try_join_all(expansions)
            .await?
            .into_iter()
            .flatten()
            .collect();

        Ok(algebra::copy_with_datasets(&root, datasets))
    }
}
