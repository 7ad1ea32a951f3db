//! HTTP API for the FocusFlow backend
//!
//! A single axum router over a shared application context. Errors map to
//! FastAPI-style JSON bodies: `{ "detail": "..." }` with 404 for missing
//! resources, 400 for invalid operations, and 500 otherwise.

pub mod server;

pub use server::{serve, AppContext};

use crate::error::FocusFlowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

impl IntoResponse for FocusFlowError {
    fn into_response(self) -> Response {
        let status = match &self {
            FocusFlowError::SourceNotFound(_) | FocusFlowError::TopicNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            FocusFlowError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let not_found = FocusFlowError::SourceNotFound(7).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad = FocusFlowError::InvalidOperation("no active plan".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let internal = FocusFlowError::Database("locked".into()).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
