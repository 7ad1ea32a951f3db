//! Persistent storage: source catalog and vector index
//!
//! Both live in a single SQLite database file. Vector similarity search
//! uses the sqlite-vec extension (a vec0 virtual table) over rusqlite with
//! deadpool connection pooling; the relational `sources` and `chunks`
//! tables sit alongside it.

pub mod catalog;
pub mod vectors;

use crate::error::{FocusFlowError, Result};
use deadpool_sqlite::{Config, Pool, Runtime};
use std::path::Path;
use tracing::info;

pub use catalog::SourceCatalog;
pub use vectors::{ChunkRecord, RetrievedChunk, VectorIndex};

/// Default connection pool size
const DEFAULT_POOL_SIZE: usize = 8;

/// Open (or create) the index database and return a shared connection pool.
///
/// Registers sqlite-vec as an auto-extension so every pooled connection
/// can query the vec0 virtual table.
pub async fn open_pool<P: AsRef<Path>>(db_path: P) -> Result<Pool> {
    let path_str = db_path.as_ref().to_string_lossy().to_string();
    info!("Opening index database at: {}", path_str);

    // Load sqlite-vec as an auto-extension so it is available for all
    // connections in the pool.
    unsafe {
        use rusqlite::ffi::sqlite3_auto_extension;

        #[allow(clippy::missing_transmute_annotations)]
        sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    }

    let mut config = Config::new(path_str);
    config.pool = Some(deadpool_sqlite::PoolConfig::new(DEFAULT_POOL_SIZE));
    let pool = config
        .create_pool(Runtime::Tokio1)
        .map_err(|e| FocusFlowError::Database(format!("Failed to create connection pool: {}", e)))?;

    Ok(pool)
}

/// Create all tables if they do not exist yet.
pub async fn init_schema(pool: &Pool, dimensions: usize) -> Result<()> {
    let conn = pool
        .get()
        .await
        .map_err(|e| FocusFlowError::Database(format!("Failed to get connection: {}", e)))?;

    let vec_table = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_vectors USING vec0(
            chunk_id INTEGER PRIMARY KEY,
            embedding FLOAT[{}]
        )",
        dimensions
    );

    conn.interact(move |conn| -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_path TEXT NOT NULL,
                page INTEGER,
                title TEXT,
                content TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_source_path ON chunks(source_path);",
        )
        .map_err(|e| FocusFlowError::Database(format!("Failed to create tables: {}", e)))?;

        conn.execute(&vec_table, [])
            .map_err(|e| FocusFlowError::Database(format!("Failed to create vec0 table: {}", e)))?;

        Ok(())
    })
    .await
    .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))??;

    info!("Index schema initialized");
    Ok(())
}
