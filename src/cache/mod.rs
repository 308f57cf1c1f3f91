//! Catalog cache
//!
//! The cache keeps the latest catalog per originator. Every crawl cycle marks
//! all entries as expired before crawling starts and deletes the entries that
//! are still marked once the cycle is over; a successful crawl overwrites the
//! entry and clears the mark in the same step.
//!
//! Two backends implement [`CatalogCache`]: [`InMemoryCatalogCache`] and the
//! SQLite-backed [`crate::storage::SqliteStorage`].

mod memory;
mod query;
mod service;

pub use memory::InMemoryCatalogCache;
pub use query::{Criterion, Operator, QuerySpec};
pub use service::CatalogQueryService;

use crate::model::{Catalog, UpdateResponse, PROPERTY_ORIGINATOR};
use crate::storage::StorageError;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    LockPoisoned,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Storage contract shared by all catalog cache backends
///
/// Implementations must make every call atomic with respect to the others:
/// a query never observes a half-applied save, mark or sweep.
pub trait CatalogCache: Send + Sync {
    /// Inserts or replaces the entry for the catalog's cache key and clears its mark
    fn save(&self, catalog: Catalog) -> CacheResult<()>;

    /// Returns copies of all cached catalogs matching the query
    fn query(&self, query: &QuerySpec) -> CacheResult<Vec<Catalog>>;

    /// Marks every current entry as expired
    fn expire_all(&self) -> CacheResult<()>;

    /// Removes every entry that is still marked, returning how many were removed
    fn delete_expired(&self) -> CacheResult<usize>;
}

/// Stores a crawl result, keyed by the URL it was fetched from
pub fn persist_response(cache: &dyn CatalogCache, response: UpdateResponse) -> CacheResult<()> {
    let UpdateResponse { source, mut catalog } = response;
    catalog
        .properties
        .insert(PROPERTY_ORIGINATOR.to_string(), Value::String(source));
    cache.save(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_response_sets_originator() {
        let cache = InMemoryCatalogCache::new();
        let response = UpdateResponse::new("https://node-a", Catalog::new("cat-1"));

        persist_response(&cache, response).unwrap();

        let stored = cache.query(&QuerySpec::all()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].originator().as_deref(), Some("https://node-a"));
        assert!(cache.contains_key("https://node-a").unwrap());
    }

    #[test]
    fn test_persist_response_replaces_by_source() {
        let cache = InMemoryCatalogCache::new();

        persist_response(&cache, UpdateResponse::new("https://node-a", Catalog::new("v1"))).unwrap();
        persist_response(&cache, UpdateResponse::new("https://node-a", Catalog::new("v2"))).unwrap();

        let stored = cache.query(&QuerySpec::all()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "v2");
    }
}
