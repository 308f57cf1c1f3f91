//! SQLite storage implementation
//!
//! One connection behind a mutex serves both the catalog cache and the
//! target directory. Every trait call runs while holding the lock, so each
//! save, mark, sweep or query is atomic with respect to the others.

use crate::cache::{CacheResult, CatalogCache, QuerySpec};
use crate::directory::TargetDirectory;
use crate::model::{Catalog, Target};
use crate::storage::schema::initialize_schema;
use crate::storage::{StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Number of cached catalogs, marked or not
    pub fn catalog_count(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM federated_catalog", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn upsert_catalog(&self, key: &str, body: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock()?.execute(
            "INSERT INTO federated_catalog (cache_key, catalog, marked, updated_at)
             VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET
                catalog = excluded.catalog,
                marked = 0,
                updated_at = excluded.updated_at",
            params![key, body, now],
        )?;
        Ok(())
    }

    fn load_catalogs(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT catalog FROM federated_catalog ORDER BY cache_key")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn mark_all(&self) -> StorageResult<()> {
        self.lock()?
            .execute("UPDATE federated_catalog SET marked = 1", [])?;
        Ok(())
    }

    fn sweep_marked(&self) -> StorageResult<usize> {
        let removed = self
            .lock()?
            .execute("DELETE FROM federated_catalog WHERE marked = 1", [])?;
        Ok(removed)
    }

    fn load_targets(&self) -> StorageResult<Vec<Target>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, url, protocols FROM target_node_directory ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, url, protocols)| Ok(Target::new(id, url, decode_protocols(&protocols)?)))
            .collect()
    }

    fn upsert_target(&self, target: &Target) -> StorageResult<()> {
        let protocols = serde_json::to_string(&target.supported_protocols)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.lock()?.execute(
            "INSERT OR REPLACE INTO target_node_directory (id, url, protocols) VALUES (?1, ?2, ?3)",
            params![target.id, target.url, protocols],
        )?;
        Ok(())
    }

    fn delete_target(&self, id: &str) -> StorageResult<Option<Target>> {
        let conn = self.lock()?;
        let existing = conn
            .query_row(
                "SELECT id, url, protocols FROM target_node_directory WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, url, protocols)) = existing else {
            return Ok(None);
        };

        conn.execute(
            "DELETE FROM target_node_directory WHERE id = ?1",
            params![id],
        )?;
        Ok(Some(Target::new(id, url, decode_protocols(&protocols)?)))
    }
}

fn decode_protocols(raw: &str) -> StorageResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl CatalogCache for SqliteStorage {
    fn save(&self, catalog: Catalog) -> CacheResult<()> {
        let body = serde_json::to_string(&catalog)?;
        self.upsert_catalog(&catalog.cache_key(), &body)?;
        Ok(())
    }

    fn query(&self, query: &QuerySpec) -> CacheResult<Vec<Catalog>> {
        let catalogs = self
            .load_catalogs()?
            .iter()
            .map(|body| serde_json::from_str::<Catalog>(body))
            .collect::<Result<Vec<_>, _>>()?;
        query.apply(catalogs.iter())
    }

    fn expire_all(&self) -> CacheResult<()> {
        self.mark_all()?;
        Ok(())
    }

    fn delete_expired(&self) -> CacheResult<usize> {
        Ok(self.sweep_marked()?)
    }
}

impl TargetDirectory for SqliteStorage {
    fn get_all(&self) -> crate::Result<Vec<Target>> {
        Ok(self.load_targets()?)
    }

    fn insert(&self, target: Target) -> crate::Result<()> {
        Ok(self.upsert_target(&target)?)
    }

    fn remove(&self, id: &str) -> crate::Result<Option<Target>> {
        Ok(self.delete_target(id)?)
    }
}
