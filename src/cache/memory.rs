//! In-memory catalog cache with mark-and-sweep expiry

use crate::cache::{CacheError, CacheResult, CatalogCache, QuerySpec};
use crate::model::Catalog;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A cached catalog together with its expiry mark
#[derive(Debug, Clone)]
struct CacheEntry {
    catalog: Catalog,
    marked: bool,
    updated_at: DateTime<Utc>,
}

/// Catalog cache held in process memory
///
/// All entries sit behind one reader/writer lock: queries share it, saves,
/// marks and sweeps take it exclusively. Waiting writers block new readers,
/// so a steady stream of queries cannot starve the crawler.
#[derive(Debug, Default)]
pub struct InMemoryCatalogCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached catalogs, marked or not
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> CacheResult<bool> {
        Ok(self.read()?.contains_key(key))
    }

    /// Returns when the entry for `key` was last saved
    pub fn last_updated(&self, key: &str) -> CacheResult<Option<DateTime<Utc>>> {
        Ok(self.read()?.get(key).map(|entry| entry.updated_at))
    }

    fn read(&self) -> CacheResult<RwLockReadGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries.read().map_err(|_| CacheError::LockPoisoned)
    }

    fn write(&self) -> CacheResult<RwLockWriteGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries.write().map_err(|_| CacheError::LockPoisoned)
    }
}

impl CatalogCache for InMemoryCatalogCache {
    fn save(&self, catalog: Catalog) -> CacheResult<()> {
        let key = catalog.cache_key();
        let entry = CacheEntry {
            catalog,
            marked: false,
            updated_at: Utc::now(),
        };
        self.write()?.insert(key, entry);
        Ok(())
    }

    fn query(&self, query: &QuerySpec) -> CacheResult<Vec<Catalog>> {
        let entries = self.read()?;
        // page in key order so offset/limit windows are stable
        let mut ordered: Vec<_> = entries.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));
        query.apply(ordered.into_iter().map(|(_, entry)| &entry.catalog))
    }

    fn expire_all(&self) -> CacheResult<()> {
        let mut entries = self.write()?;
        for entry in entries.values_mut() {
            entry.marked = true;
        }
        Ok(())
    }

    fn delete_expired(&self) -> CacheResult<usize> {
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.marked);
        Ok(before - entries.len())
    }
}
