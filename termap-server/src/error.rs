//! Error types for termap-server
//!
//! Every error response carries a `{"detail": <message>}` body.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Malformed request or uploaded content (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or mistyped request field (422)
    #[error("Validation failed: {0}")]
    Unprocessable(String),

    /// Write refused by the duplicate policy (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Extractor rejection, keeping the status axum chose
    #[error("Request rejected: {1}")]
    Rejected(StatusCode, String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// termap-common error
    #[error(transparent)]
    Common(#[from] termap_common::Error),
}

impl ApiError {
    fn status_and_detail(self) -> (StatusCode, String) {
        use termap_common::Error as CommonError;

        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Rejected(status, msg) => (status, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Common(err) => match err {
                CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                CommonError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
                CommonError::Conflict(msg) => (StatusCode::CONFLICT, msg),
                other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, detail);
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected(err.status(), err.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
