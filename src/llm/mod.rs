//! Language-model clients
//!
//! A single text-completion interface with two implementations selected by
//! configuration at startup: a local Ollama server for offline use and the
//! hosted Hugging Face inference API for cloud demos.

pub mod huggingface;
pub mod ollama;

use crate::config::{LlmProvider, LlmSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use huggingface::HuggingFaceClient;
pub use ollama::OllamaClient;

/// Generation can be slow on small local models; match the frontend's
/// most generous timeout.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Text-completion client trait
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete a prompt, returning the generated text.
    ///
    /// One call per invocation, no retries; failures surface as
    /// `FocusFlowError::LlmApi`.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Build the completion client selected by the settings
pub fn build_client(settings: &LlmSettings) -> Result<Arc<dyn CompletionClient>> {
    match settings.provider {
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::new(
            settings.ollama_base_url.clone(),
            settings.model.clone(),
        )?)),
        LlmProvider::HuggingFace => Ok(Arc::new(HuggingFaceClient::new(
            settings.api_token.clone(),
            settings.model.clone(),
            settings.max_tokens,
            settings.temperature,
        )?)),
    }
}
