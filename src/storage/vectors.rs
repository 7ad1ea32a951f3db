//! Vector index over ingested document chunks
//!
//! Chunk text and retrieval metadata live in the `chunks` table; embeddings
//! live in a sqlite-vec vec0 virtual table keyed by chunk id. KNN search
//! returns chunks ordered by ascending distance.

use crate::error::{FocusFlowError, Result};
use deadpool_sqlite::Pool;
use rusqlite::Result as SqliteResult;
use tracing::{debug, info};

/// A chunk ready for insertion into the index
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub content: String,
    /// Origin path or URL, used for exact-match deletion
    pub source_path: String,
    /// Page number for paginated documents
    pub page: Option<u32>,
    /// Title for web pages and videos
    pub title: Option<String>,
    pub embedding: Vec<f32>,
}

/// A chunk returned from similarity search
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_path: String,
    pub page: Option<u32>,
    pub title: Option<String>,
    /// sqlite-vec distance (lower is closer)
    pub distance: f32,
}

/// Vector index backed by the shared index database
#[derive(Clone)]
pub struct VectorIndex {
    pool: Pool,
    dimensions: usize,
}

impl VectorIndex {
    pub fn new(pool: Pool, dimensions: usize) -> Self {
        Self { pool, dimensions }
    }

    /// Insert a batch of chunks with their embeddings
    pub async fn add_chunks(&self, records: Vec<ChunkRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        for record in &records {
            if record.embedding.len() != self.dimensions {
                return Err(FocusFlowError::Embedding(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    record.embedding.len()
                )));
            }
        }

        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        let count = records.len();
        conn.interact(move |conn| -> Result<()> {
            let tx = conn
                .transaction()
                .map_err(|e| FocusFlowError::Database(format!("Failed to begin: {}", e)))?;

            for record in records {
                tx.execute(
                    "INSERT INTO chunks (source_path, page, title, content)
                     VALUES (?, ?, ?, ?)",
                    rusqlite::params![
                        record.source_path,
                        record.page,
                        record.title,
                        record.content
                    ],
                )
                .map_err(|e| FocusFlowError::Database(format!("Failed to insert chunk: {}", e)))?;

                let chunk_id = tx.last_insert_rowid();
                let embedding_json = serde_json::to_string(&record.embedding).map_err(|e| {
                    FocusFlowError::Other(format!("Failed to serialize embedding: {}", e))
                })?;

                tx.execute(
                    "INSERT INTO chunk_vectors (chunk_id, embedding)
                     VALUES (?, vec_f32(?))",
                    rusqlite::params![chunk_id, embedding_json],
                )
                .map_err(|e| FocusFlowError::Database(format!("Failed to store vector: {}", e)))?;
            }

            tx.commit()
                .map_err(|e| FocusFlowError::Database(format!("Failed to commit: {}", e)))
        })
        .await
        .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))??;

        info!("Indexed {} chunks", count);
        Ok(count)
    }

    /// KNN search for the `limit` nearest chunks to the query embedding
    pub async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        if query_embedding.len() != self.dimensions {
            return Err(FocusFlowError::Embedding(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                query_embedding.len()
            )));
        }

        debug!("Searching vector index (limit: {})", limit);

        let query_json = serde_json::to_string(query_embedding)
            .map_err(|e| FocusFlowError::Other(format!("Failed to serialize query: {}", e)))?;

        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        conn.interact(move |conn| -> Result<Vec<RetrievedChunk>> {
            let mut stmt = conn
                .prepare(
                    "SELECT c.content, c.source_path, c.page, c.title, v.distance
                     FROM (SELECT chunk_id, distance
                           FROM chunk_vectors
                           WHERE embedding MATCH vec_f32(?)
                           ORDER BY distance
                           LIMIT ?) v
                     JOIN chunks c ON c.id = v.chunk_id
                     ORDER BY v.distance",
                )
                .map_err(|e| FocusFlowError::Database(format!("Failed to prepare search: {}", e)))?;

            let results: SqliteResult<Vec<RetrievedChunk>> = stmt
                .query_map(rusqlite::params![query_json, limit as i64], |row| {
                    Ok(RetrievedChunk {
                        content: row.get(0)?,
                        source_path: row.get(1)?,
                        page: row.get(2)?,
                        title: row.get(3)?,
                        distance: row.get(4)?,
                    })
                })
                .and_then(|rows| rows.collect());

            results.map_err(|e| FocusFlowError::Database(format!("Search failed: {}", e)))
        })
        .await
        .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))?
    }

    /// Delete all chunks whose source path matches exactly.
    ///
    /// Returns the number of chunks removed.
    pub async fn delete_by_source(&self, source_path: &str) -> Result<usize> {
        let source_path = source_path.to_string();
        let path = source_path.clone();

        let conn = self.pool.get().await.map_err(|e| {
            FocusFlowError::Database(format!("Failed to get connection: {}", e))
        })?;

        let deleted = conn
            .interact(move |conn| -> Result<usize> {
                let tx = conn
                    .transaction()
                    .map_err(|e| FocusFlowError::Database(format!("Failed to begin: {}", e)))?;

                tx.execute(
                    "DELETE FROM chunk_vectors WHERE chunk_id IN
                     (SELECT id FROM chunks WHERE source_path = ?)",
                    rusqlite::params![path],
                )
                .map_err(|e| FocusFlowError::Database(format!("Failed to delete vectors: {}", e)))?;

                let deleted = tx
                    .execute(
                        "DELETE FROM chunks WHERE source_path = ?",
                        rusqlite::params![path],
                    )
                    .map_err(|e| {
                        FocusFlowError::Database(format!("Failed to delete chunks: {}", e))
                    })?;

                tx.commit()
                    .map_err(|e| FocusFlowError::Database(format!("Failed to commit: {}", e)))?;

                Ok(deleted)
            })
            .await
            .map_err(|e| FocusFlowError::Database(format!("Pool interaction failed: {}", e)))??;

        info!("Deleted {} chunks for source {}", deleted, source_path);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_schema, open_pool};
    use tempfile::TempDir;

    const DIMS: usize = 4;

    async fn test_index() -> (TempDir, VectorIndex) {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("index.db")).await.unwrap();
        init_schema(&pool, DIMS).await.unwrap();
        (dir, VectorIndex::new(pool, DIMS))
    }

    fn record(content: &str, source: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            content: content.to_string(),
            source_path: source.to_string(),
            page: Some(1),
            title: None,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let (_dir, index) = test_index().await;

        index
            .add_chunks(vec![
                record("heat flows", "a.pdf", vec![1.0, 0.0, 0.0, 0.0]),
                record("entropy rises", "a.pdf", vec![0.0, 1.0, 0.0, 0.0]),
                record("cells divide", "b.pdf", vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "heat flows");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_delete_by_source_exact_match() {
        let (_dir, index) = test_index().await;

        index
            .add_chunks(vec![
                record("one", "a.pdf", vec![1.0, 0.0, 0.0, 0.0]),
                record("two", "a.pdf", vec![0.0, 1.0, 0.0, 0.0]),
                record("three", "b.pdf", vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let deleted = index.delete_by_source("a.pdf").await.unwrap();
        assert_eq!(deleted, 2);

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_path, "b.pdf");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let (_dir, index) = test_index().await;
        let err = index.search(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, FocusFlowError::Embedding(_)));
    }
}
