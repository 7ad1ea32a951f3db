//! Error types for the FocusFlow backend
//!
//! This module provides structured error handling using thiserror, with
//! anyhow for propagation at the binary seam.

use thiserror::Error;

/// Main error type for FocusFlow operations
#[derive(Error, Debug)]
pub enum FocusFlowError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// LLM provider request failed
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Document loading or text extraction failed
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Source not found in the catalog
    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    /// Topic not found in the active study plan
    #[error("Topic not found: {0}")]
    TopicNotFound(u32),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid operation (e.g., unlocking a topic outside the active plan)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for FocusFlow operations
pub type Result<T> = std::result::Result<T, FocusFlowError>;

/// Convert anyhow::Error to FocusFlowError
impl From<anyhow::Error> for FocusFlowError {
    fn from(err: anyhow::Error) -> Self {
        FocusFlowError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FocusFlowError::SourceNotFound(42);
        assert_eq!(err.to_string(), "Source not found: 42");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: FocusFlowError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, FocusFlowError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
