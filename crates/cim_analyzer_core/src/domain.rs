//! crates/cim_analyzer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};

/// Represents a user - used throughout app.
///
/// The id is either issued by the identity provider or generated locally at
/// registration, and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>, // Provider-issued identities have none
    pub full_name: Option<String>,
}

// Only used internally for login/registration - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: String,
    pub email: String,
    pub hashed_password: String,
}

/// The identity resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// One uploaded document's outcome, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub id: i64,
    pub user_id: String,
    pub filename: String,
    pub preview_text: String,
    /// The raw structured-text insight payload. Not guaranteed to be valid JSON.
    pub summary_json: String,
    pub created_at: DateTime<Utc>,
    pub user_rating: Option<f64>,
    pub confidence_score: Option<f64>,
}

/// The fields supplied when inserting a new analysis result. The id and
/// timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAnalysisResult {
    pub user_id: String,
    pub filename: String,
    pub preview_text: String,
    pub summary_json: String,
}

/// A file received from the client, before any validation.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What the upload pipeline hands back to the caller once a result is stored.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub result: AnalysisResult,
    /// The full text extracted from the qualifying pages.
    pub extracted_text: String,
}
