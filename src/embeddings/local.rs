//! Local embedding service using fastembed
//!
//! Runs embedding models locally via ONNX Runtime. Models are downloaded
//! on first use to the cache directory and loaded from cache afterwards.

use crate::config::EmbeddingSettings;
use crate::embeddings::EmbeddingService;
use crate::error::{FocusFlowError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, info};

/// Maximum texts embedded in a single fastembed call
const BATCH_SIZE: usize = 64;

/// Local embedding service using fastembed
pub struct LocalEmbeddingService {
    /// The underlying fastembed model (Arc<Mutex> for thread-safe interior mutability)
    model: Arc<Mutex<TextEmbedding>>,
    settings: EmbeddingSettings,
    dimensions: usize,
}

impl LocalEmbeddingService {
    /// Create a new local embedding service with the given settings.
    ///
    /// This downloads the model if not already cached, which can take a
    /// while on first run.
    pub async fn new(settings: EmbeddingSettings) -> Result<Self> {
        info!(
            "Initializing local embedding service: model={}, cache={:?}",
            settings.model, settings.cache_dir
        );

        let embedding_model = Self::model_name_to_enum(&settings.model)?;

        let mut init_options = InitOptions::default();
        init_options.model_name = embedding_model;
        init_options.show_download_progress = false;
        if let Some(cache_dir) = settings.cache_dir.clone() {
            init_options.cache_dir = cache_dir;
        }

        // Load model in a blocking task (may download if not cached)
        let model = task::spawn_blocking(move || TextEmbedding::try_new(init_options))
            .await
            .map_err(|e| FocusFlowError::Other(format!("Task join error: {}", e)))?
            .map_err(|e| FocusFlowError::Embedding(format!("Failed to load model: {}", e)))?;

        let dimensions = settings.dimensions();

        info!(
            "Local embedding service initialized: {} dimensions",
            dimensions
        );

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            settings,
            dimensions,
        })
    }

    /// Map a model name string to fastembed's EmbeddingModel enum
    fn model_name_to_enum(model_name: &str) -> Result<EmbeddingModel> {
        match model_name {
            "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
            "nomic-embed-text-v1" => Ok(EmbeddingModel::NomicEmbedTextV1),
            "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
            _ => Err(FocusFlowError::Config(format!(
                "Unsupported embedding model: '{}'",
                model_name
            ))),
        }
    }

    /// Run fastembed's synchronous embed in a blocking task
    async fn embed_batch_internal(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} texts", texts.len());

        let model = Arc::clone(&self.model);
        let dimensions = self.dimensions;

        let embeddings = task::spawn_blocking(move || {
            let mut model_guard = model
                .lock()
                .map_err(|e| format!("Mutex lock failed: {}", e))?;

            model_guard
                .embed(texts, None)
                .map_err(|e| format!("Embedding generation failed: {}", e))
        })
        .await
        .map_err(|e| FocusFlowError::Other(format!("Task join error: {}", e)))?
        .map_err(FocusFlowError::Embedding)?;

        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimensions {
                return Err(FocusFlowError::Embedding(format!(
                    "Embedding {} has wrong dimensions: expected {}, got {}",
                    i,
                    dimensions,
                    embedding.len()
                )));
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(FocusFlowError::Embedding(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut embeddings = self.embed_batch_internal(vec![text.to_string()]).await?;

        embeddings
            .pop()
            .ok_or_else(|| FocusFlowError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts_owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();

        let mut all_embeddings = Vec::new();
        for chunk in texts_owned.chunks(BATCH_SIZE) {
            let chunk_embeddings = self.embed_batch_internal(chunk.to_vec()).await?;
            all_embeddings.extend(chunk_embeddings);
        }

        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_mapping() {
        assert!(LocalEmbeddingService::model_name_to_enum("all-MiniLM-L6-v2").is_ok());
        assert!(LocalEmbeddingService::model_name_to_enum("nomic-embed-text-v1.5").is_ok());
        assert!(LocalEmbeddingService::model_name_to_enum("not-a-model").is_err());
    }
}
