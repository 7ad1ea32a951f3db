//! Configuration for the FocusFlow backend
//!
//! Settings are environment-driven, mirroring a single-user deployment:
//! a provider switch for the language model (local Ollama vs. hosted
//! Hugging Face), a data directory for the vector index, uploads, and the
//! student profile, and embedding/chunking parameters.

use crate::error::{FocusFlowError, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::debug;

/// Default chunk size for document splitting (characters)
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between adjacent chunks (characters)
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Which language-model backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Local Ollama server (offline mode)
    Ollama,
    /// Hosted Hugging Face inference API (cloud demo mode)
    HuggingFace,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::HuggingFace => "huggingface",
        }
    }
}

/// Language-model settings for the selected provider
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Model identifier for the provider
    pub model: String,
    /// Base URL for Ollama
    pub ollama_base_url: String,
    /// API token for Hugging Face
    pub api_token: String,
    /// Max new tokens for hosted generation
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
}

/// Embedding model settings
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// fastembed model name
    pub model: String,
    /// Optional cache directory for downloaded model files
    pub cache_dir: Option<PathBuf>,
}

impl EmbeddingSettings {
    /// Embedding dimensionality for the configured model
    pub fn dimensions(&self) -> usize {
        match self.model.as_str() {
            "all-MiniLM-L6-v2" | "all-MiniLM-L12-v2" | "bge-small-en-v1.5" => 384,
            "nomic-embed-text-v1" | "nomic-embed-text-v1.5" | "bge-base-en-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            _ => 384,
        }
    }
}

/// Top-level settings for the backend
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP API binds to
    pub addr: SocketAddr,
    /// Root data directory (index, uploads, profile)
    pub data_dir: PathBuf,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    /// Chunk size for document splitting
    pub chunk_size: usize,
    /// Overlap between adjacent chunks
    pub chunk_overlap: usize,
}

impl Settings {
    /// Build settings from environment variables, with defaults suitable
    /// for a single-user local deployment.
    pub fn from_env() -> Result<Self> {
        let provider = match env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .to_lowercase()
            .as_str()
        {
            "huggingface" => LlmProvider::HuggingFace,
            _ => LlmProvider::Ollama,
        };

        let model = match provider {
            LlmProvider::Ollama => {
                env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2:1b".to_string())
            }
            LlmProvider::HuggingFace => env::var("HUGGINGFACE_MODEL")
                .unwrap_or_else(|_| "meta-llama/Meta-Llama-3-8B-Instruct".to_string()),
        };

        let llm = LlmSettings {
            provider,
            model,
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            api_token: env::var("HUGGINGFACE_API_TOKEN").unwrap_or_default(),
            max_tokens: 512,
            temperature: 0.7,
        };

        if llm.provider == LlmProvider::HuggingFace && llm.api_token.is_empty() {
            return Err(FocusFlowError::Config(
                "HUGGINGFACE_API_TOKEN not set for huggingface provider".to_string(),
            ));
        }

        let data_dir = match env::var("FOCUSFLOW_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::home_dir()
                .ok_or_else(|| {
                    FocusFlowError::Config("Could not determine home directory".to_string())
                })?
                .join(".focusflow"),
        };

        let addr = env::var("FOCUSFLOW_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
            .parse()
            .map_err(|e| FocusFlowError::Config(format!("Invalid FOCUSFLOW_ADDR: {}", e)))?;

        let embedding = EmbeddingSettings {
            model: env::var("FOCUSFLOW_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string()),
            cache_dir: None,
        };

        debug!("Loaded settings: provider={:?}, data_dir={:?}", provider, data_dir);

        Ok(Self {
            addr,
            data_dir,
            llm,
            embedding,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        })
    }

    /// Path to the SQLite database holding the source catalog and vectors
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.db")
    }

    /// Directory uploaded files are stored in
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_dimensions() {
        let settings = EmbeddingSettings {
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
        };
        assert_eq!(settings.dimensions(), 384);

        let settings = EmbeddingSettings {
            model: "nomic-embed-text-v1.5".to_string(),
            cache_dir: None,
        };
        assert_eq!(settings.dimensions(), 768);
    }
}
