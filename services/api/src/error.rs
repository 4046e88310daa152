//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is rendered as an HTTP response.

use crate::config::ConfigError;
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cim_analyzer_core::{AnalysisError, PortError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A classified failure from the upload pipeline or result operations.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// A request body that could not be read as the expected JSON.
    #[error("Invalid request body: {0}")]
    JsonBody(#[from] JsonRejection),

    /// A path parameter that could not be parsed.
    #[error("Invalid path parameter: {0}")]
    PathParam(#[from] PathRejection),

    /// A request that is not a readable multipart form.
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartRejection),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Analysis(e) => match e {
                AnalysisError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, e.to_string()),
                AnalysisError::InvalidUpload(_)
                | AnalysisError::NoContent
                | AnalysisError::InvalidInput(_)
                | AnalysisError::Conflict(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                AnalysisError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                AnalysisError::InsightUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
                AnalysisError::Internal(_) => internal(),
            },
            ApiError::JsonBody(rejection) => (rejection.status(), self.to_string()),
            ApiError::PathParam(rejection) => (rejection.status(), self.to_string()),
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Port(PortError::Unauthorized(_)) => {
                (StatusCode::UNAUTHORIZED, "Not authenticated".to_string())
            }
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Port(PortError::Conflict(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            _ => internal(),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody { detail })).into_response()
    }
}
