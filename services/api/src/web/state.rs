//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::jwt::LegacyTokens;
use cim_analyzer_core::ports::{
    CredentialVerifier, DatabaseService, InsightService, PdfTextService,
};
use cim_analyzer_core::{AnalysisPipeline, ResultService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Nothing in here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub tokens: Arc<LegacyTokens>,
    pub pipeline: AnalysisPipeline,
    pub results: ResultService,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: Arc<LegacyTokens>,
        pdf: Arc<dyn PdfTextService>,
        insight: Arc<dyn InsightService>,
    ) -> Self {
        Self {
            pipeline: AnalysisPipeline::new(db.clone(), pdf, insight),
            results: ResultService::new(db.clone()),
            db,
            verifier,
            tokens,
        }
    }
}
