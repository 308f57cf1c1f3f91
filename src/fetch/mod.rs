//! Catalog fetching
//!
//! This module obtains one node's complete catalog:
//! - `transport`: sends a single catalog request and returns the raw body
//! - `codec`: decodes a body into a [`Catalog`](crate::model::Catalog)
//! - `paging`: walks all pages of a catalog and expands nested sub-catalogs
//! - `action`: the crawl action that plugs the fetcher into the crawler

mod action;
mod codec;
mod paging;
mod transport;

pub use action::CatalogRequestAction;
pub use codec::{CatalogDecoder, JsonCatalogDecoder};
pub use paging::PagingCatalogFetcher;
pub use transport::{build_http_client, HttpTransport, Transport};

/// Half-open index range `[from, to)` of the datasets requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub from: usize,
    pub to: usize,
}

/// A request for one page of a node's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    /// URL of the node's catalog endpoint
    pub counterparty_address: String,

    /// Participant id of the node, if known
    pub counterparty_id: Option<String>,

    pub protocol: String,

    pub range: Range,
}

impl CatalogRequest {
    pub fn new(
        counterparty_address: impl Into<String>,
        counterparty_id: Option<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            counterparty_address: counterparty_address.into(),
            counterparty_id,
            protocol: protocol.into(),
            range: Range { from: 0, to: 0 },
        }
    }

    /// Returns a copy of this request scoped to `[from, from + batch_size)`
    pub fn page(&self, from: usize, batch_size: usize) -> Self {
        Self {
            range: Range {
                from,
                to: from + batch_size,
            },
            ..self.clone()
        }
    }

    /// Returns a copy of this request aimed at another endpoint
    pub fn redirect(&self, address: impl Into<String>, counterparty_id: Option<String>) -> Self {
        Self {
            counterparty_address: address.into(),
            counterparty_id,
            ..self.clone()
        }
    }
}
