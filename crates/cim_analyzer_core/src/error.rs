//! crates/cim_analyzer_core/src/error.rs
//!
//! The error taxonomy surfaced to callers of the upload pipeline and the
//! result feedback operations.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    InvalidUpload(String),
    #[error("File uploaded but no readable business content was found in the PDF.")]
    NoContent,
    #[error("Insight analysis failed: {0}")]
    InsightUnavailable(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PortError> for AnalysisError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(msg) => AnalysisError::NotFound(msg),
            PortError::Conflict(msg) => AnalysisError::Conflict(msg),
            PortError::Unauthorized(msg) => AnalysisError::Unauthenticated(msg),
            PortError::Unexpected(msg) => AnalysisError::Internal(msg),
        }
    }
}
