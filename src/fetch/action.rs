use crate::crawler::CrawlAction;
use crate::fetch::{CatalogRequest, PagingCatalogFetcher};
use crate::model::{UpdateRequest, UpdateResponse};
use crate::Result;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Crawl action that fetches a node's catalog with the paging fetcher
pub struct CatalogRequestAction {
    fetcher: PagingCatalogFetcher,
    batch_size: usize,
}

impl CatalogRequestAction {
    pub fn new(fetcher: PagingCatalogFetcher, batch_size: usize) -> Self {
        Self {
            fetcher,
            batch_size,
        }
    }
}

impl CrawlAction for CatalogRequestAction {
    fn apply(&self, request: UpdateRequest) -> BoxFuture<'_, Result<UpdateResponse>> {
        async move {
            let catalog_request = CatalogRequest::new(
                request.node_url.clone(),
                Some(request.node_id.clone()),
                request.protocol.clone(),
            );

            let catalog = self.fetcher.fetch(catalog_request, 0, self.batch_size).await?;
            tracing::debug!(
                "Fetched catalog {} with {} datasets from {}",
                catalog.id,
                catalog.datasets.len(),
                request.node_url
            );

            Ok(UpdateResponse::new(request.node_url, catalog))
        }
        .boxed()
    }
}
