//! Engine error taxonomy and its HTTP rendering.

use crate::store::StoreError;
use crate::validator::ValidationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no collection is registered under `{0}`")]
    CollectionNotFound(String),

    #[error("no definition matches {method} {path}")]
    DefinitionNotFound { method: String, path: String },

    #[error("request to {method} {path} failed validation: {source}")]
    ValidationFailed {
        method: String,
        path: String,
        #[source]
        source: ValidationError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::CollectionNotFound(_) | EngineError::DefinitionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            EngineError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::CollectionNotFound(_) => "collection_not_found",
            EngineError::DefinitionNotFound { .. } => "definition_not_found",
            EngineError::ValidationFailed { .. } => "validation_failed",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            EngineError::Internal(detail) => {
                error!(detail = %detail, "Internal engine error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "error": self.code(), "message": message });
        if let EngineError::ValidationFailed { source, .. } = &self {
            if let Some(field) = source.path() {
                body["field"] = json!(field);
            }
        }

        (status, Json(body)).into_response()
    }
}
