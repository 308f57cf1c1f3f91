//! Read-side access to the catalog cache

use crate::cache::{CatalogCache, QuerySpec};
use crate::model::{algebra, Catalog};
use crate::Result;
use std::sync::Arc;

/// Answers catalog queries for consumers of the federated catalog
#[derive(Clone)]
pub struct CatalogQueryService {
    cache: Arc<dyn CatalogCache>,
}

impl CatalogQueryService {
    pub fn new(cache: Arc<dyn CatalogCache>) -> Self {
        Self { cache }
    }

    /// Returns the cached catalogs matching `query`
    ///
    /// When `flatten` is set every result has its sub-catalog hierarchy
    /// collapsed into a single level; the cached entries are not touched.
    pub fn get_catalogs(&self, query: &QuerySpec, flatten: bool) -> Result<Vec<Catalog>> {
        let catalogs = self.cache.query(query)?;
        tracing::debug!(
            "Catalog query answered with {} catalogs (flatten: {})",
            catalogs.len(),
            flatten
        );

        if flatten {
            Ok(catalogs.iter().map(algebra::flatten).collect())
        } else {
            Ok(catalogs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCatalogCache;
    use crate::model::Dataset;

    fn nested() -> Catalog {
        Catalog::new("root")
            .with_dataset(Dataset::new("d1"))
            .with_sub_catalog(
                Catalog::new("sub")
                    .with_dataset(Dataset::new("d2"))
                    .with_sub_catalog(Catalog::new("leaf").with_dataset(Dataset::new("d3"))),
            )
    }

    #[test]
    fn test_get_catalogs_nested() {
        let cache = Arc::new(InMemoryCatalogCache::new());
        cache.save(nested()).unwrap();
        let service = CatalogQueryService::new(cache);

        let result = service.get_catalogs(&QuerySpec::all(), false).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].datasets.len(), 2);
        assert_eq!(result[0].sub_catalogs().count(), 1);
    }

    #[test]
    fn test_get_catalogs_flattened() {
        let cache = Arc::new(InMemoryCatalogCache::new());
        cache.save(nested()).unwrap();
        let service = CatalogQueryService::new(cache.clone());

        let result = service.get_catalogs(&QuerySpec::all(), true).unwrap();
        let ids: Vec<_> = result[0].datasets.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
        assert_eq!(result[0].sub_catalogs().count(), 0);

        // the cache keeps the hierarchy
        let stored = cache.query(&QuerySpec::all()).unwrap();
        assert_eq!(stored[0].sub_catalogs().count(), 1);
    }
}
