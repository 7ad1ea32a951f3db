//! Hosted Hugging Face completion client
//!
//! Calls the serverless inference API with a bearer token. Used for the
//! cloud demo mode where no local model server is available.

use crate::error::{FocusFlowError, Result};
use crate::llm::{CompletionClient, REQUEST_TIMEOUT_SECS};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api-inference.huggingface.co/models";

/// Hugging Face inference API client
pub struct HuggingFaceClient {
    client: Client,
    api_token: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

/// Inference API request format
#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: usize,
    temperature: f32,
    return_full_text: bool,
}

/// Inference API response format (one entry per input)
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    generated_text: String,
}

impl HuggingFaceClient {
    /// Create a new client with the given token and model
    pub fn new(
        api_token: String,
        model: String,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<Self> {
        if api_token.is_empty() {
            return Err(FocusFlowError::Config(
                "HUGGINGFACE_API_TOKEN not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FocusFlowError::LlmApi(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            api_token,
            model,
            max_tokens,
            temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for HuggingFaceClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("Calling Hugging Face model {}", self.model);

        let request = InferenceRequest {
            inputs: prompt.to_string(),
            parameters: InferenceParameters {
                max_new_tokens: self.max_tokens,
                temperature: self.temperature,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(format!("{}/{}", API_BASE, self.model))
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(FocusFlowError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FocusFlowError::LlmApi(format!(
                "Inference API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: Vec<InferenceResponse> = response
            .json()
            .await
            .map_err(|e| FocusFlowError::LlmApi(format!("Failed to parse response: {}", e)))?;

        api_response
            .into_iter()
            .next()
            .map(|r| r.generated_text)
            .ok_or_else(|| FocusFlowError::LlmApi("Empty response from API".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected() {
        let result = HuggingFaceClient::new(
            String::new(),
            "meta-llama/Meta-Llama-3-8B-Instruct".to_string(),
            512,
            0.7,
        );
        assert!(result.is_err());
    }
}
