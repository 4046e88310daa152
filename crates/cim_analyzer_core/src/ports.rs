//! crates/cim_analyzer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{AnalysisResult, AuthenticatedUser, NewAnalysisResult, User, UserCredentials};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Inserts a bare user row for `user_id` if none exists and returns it.
    async fn get_or_create_user(&self, user_id: &str) -> PortResult<User>;

    /// Fails with `PortError::Conflict` when the email is already registered.
    async fn create_user_with_email(
        &self,
        user_id: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn list_users(&self) -> PortResult<Vec<User>>;

    // --- Analysis Results ---
    async fn create_result(&self, new_result: NewAnalysisResult) -> PortResult<AnalysisResult>;

    /// Newest first.
    async fn list_results_for_user(&self, user_id: &str) -> PortResult<Vec<AnalysisResult>>;

    /// Fails with `PortError::NotFound` unless `result_id` exists and is owned by `user_id`.
    async fn get_result_for_user(&self, result_id: i64, user_id: &str)
        -> PortResult<AnalysisResult>;

    async fn update_rating(&self, result_id: i64, user_id: &str, rating: f64) -> PortResult<()>;

    async fn update_confidence(
        &self,
        result_id: i64,
        user_id: &str,
        confidence: f64,
    ) -> PortResult<()>;

    async fn delete_result(&self, result_id: i64, user_id: &str) -> PortResult<()>;

    // --- Administration ---
    /// Removes every result and every user. Returns `(results, users)` deleted.
    async fn purge_all(&self) -> PortResult<(u64, u64)>;
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolves a raw bearer token into a user identity.
    async fn verify(&self, token: &str) -> PortResult<AuthenticatedUser>;
}

#[async_trait]
pub trait PdfTextService: Send + Sync {
    /// Extracts page text in page order, feeding each page to a
    /// [`PageSelection`](crate::upload::PageSelection) and stopping as soon as
    /// it is full. Returns the selected pages.
    async fn extract_selected_pages(&self, pdf_bytes: &[u8]) -> PortResult<Vec<String>>;
}

#[async_trait]
pub trait InsightService: Send + Sync {
    /// Summarizes the extracted document text into the raw insight payload.
    async fn request_insight(&self, document_text: &str) -> PortResult<String>;
}
