//! Database schema definitions
//!
//! Two tables back the SQLite storage: the catalog cache and the target
//! node directory.

/// Version stored in `PRAGMA user_version` once the schema is in place
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Latest catalog per originator, with its expiry mark
CREATE TABLE IF NOT EXISTS federated_catalog (
    cache_key TEXT PRIMARY KEY,
    catalog TEXT NOT NULL,
    marked INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_federated_catalog_marked ON federated_catalog(marked);

-- Nodes to crawl
CREATE TABLE IF NOT EXISTS target_node_directory (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    protocols TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version recorded in the database
pub fn schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}
