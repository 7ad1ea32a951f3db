//! Relational catalog of ingested sources
//!
//! Sources are never hard-deleted: removal flips `is_active` off, which
//! hides the source from listings while keeping the row as the durable
//! record of what was ingested.

use crate::error::{FocusFlowError, Result};
use crate::types::{Source, SourceKind};
use deadpool_sqlite::Pool;
use rusqlite::Result as SqliteResult;
use tracing::debug;

/// Catalog of ingested sources backed by the shared index database
#[derive(Clone)]
pub struct SourceCatalog {
    pool: Pool,
}

impl SourceCatalog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Register a newly ingested source and return it with its assigned id
    pub async fn add(
        &self,
        filename: &str,
        kind: SourceKind,
        file_path: &str,
    ) -> Result<Source> {
        let filename = filename.to_string();
        let file_path = file_path.to_string();

        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        let id = conn
            .interact(move |conn| -> Result<i64> {
                conn.execute(
                    "INSERT INTO sources (filename, kind, file_path, is_active)
                     VALUES (?, ?, ?, 1)",
                    rusqlite::params![filename, kind.as_str(), file_path],
                )
                .map_err(|e| FocusFlowError::Database(format!("Failed to insert source: {}", e)))?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))??;

        debug!("Registered source {} ({})", id, kind.as_str());

        self.get(id).await
    }

    /// Fetch a source by id, active or not
    pub async fn get(&self, id: i64) -> Result<Source> {
        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        conn.interact(move |conn| -> Result<Source> {
            let result: SqliteResult<Source> = conn.query_row(
                "SELECT id, filename, kind, file_path, is_active FROM sources WHERE id = ?",
                rusqlite::params![id],
                row_to_source,
            );

            match result {
                Ok(source) => Ok(source),
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    Err(FocusFlowError::SourceNotFound(id))
                }
                Err(e) => Err(FocusFlowError::Database(format!(
                    "Failed to fetch source: {}",
                    e
                ))),
            }
        })
        .await
        .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))?
    }

    /// List all active sources
    pub async fn list(&self) -> Result<Vec<Source>> {
        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        conn.interact(|conn| -> Result<Vec<Source>> {
            let mut stmt = conn
                .prepare(
                    "SELECT id, filename, kind, file_path, is_active
                     FROM sources WHERE is_active = 1 ORDER BY id",
                )
                .map_err(|e| FocusFlowError::Database(format!("Failed to prepare query: {}", e)))?;

            let sources: SqliteResult<Vec<Source>> =
                stmt.query_map([], row_to_source).and_then(|rows| rows.collect());

            sources.map_err(|e| FocusFlowError::Database(format!("Failed to list sources: {}", e)))
        })
        .await
        .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))?
    }

    /// Soft-delete a source. Returns the source as it was before deletion.
    pub async fn soft_delete(&self, id: i64) -> Result<Source> {
        let source = self.get(id).await?;

        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        conn.interact(move |conn| -> Result<()> {
            conn.execute(
                "UPDATE sources SET is_active = 0 WHERE id = ?",
                rusqlite::params![id],
            )
            .map_err(|e| FocusFlowError::Database(format!("Failed to soft-delete source: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))??;

        debug!("Soft-deleted source {}", id);
        Ok(source)
    }
}

fn row_to_source(row: &rusqlite::Row<'_>) -> SqliteResult<Source> {
    let kind: String = row.get(2)?;
    Ok(Source {
        id: row.get(0)?,
        filename: row.get(1)?,
        kind: SourceKind::parse(&kind),
        file_path: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_schema, open_pool};
    use tempfile::TempDir;

    async fn test_catalog() -> (TempDir, SourceCatalog) {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("index.db")).await.unwrap();
        init_schema(&pool, 4).await.unwrap();
        (dir, SourceCatalog::new(pool))
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (_dir, catalog) = test_catalog().await;

        let source = catalog
            .add("notes.pdf", SourceKind::Local, "data/notes.pdf")
            .await
            .unwrap();
        assert_eq!(source.filename, "notes.pdf");
        assert!(source.is_active);

        let listed = catalog.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, source.id);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_listing() {
        let (_dir, catalog) = test_catalog().await;

        let source = catalog
            .add("notes.pdf", SourceKind::Local, "data/notes.pdf")
            .await
            .unwrap();
        catalog.soft_delete(source.id).await.unwrap();

        assert!(catalog.list().await.unwrap().is_empty());
        // Row still exists, just inactive
        let fetched = catalog.get(source.id).await.unwrap();
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let (_dir, catalog) = test_catalog().await;
        let err = catalog.get(999).await.unwrap_err();
        assert!(matches!(err, FocusFlowError::SourceNotFound(999)));
    }
}
