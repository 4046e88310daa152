//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the analysis endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::auth::{self, LoginRequest, RegisterRequest, TokenResponse};
use crate::web::extract::{ResultId, ValidatedJson};
use crate::web::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use cim_analyzer_core::upload::truncate_chars;
use cim_analyzer_core::{AnalysisError, AnalysisResult, AuthenticatedUser, Upload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// Characters of extracted text echoed back in the upload response.
pub const RESPONSE_PREVIEW_CHARS: usize = 300;
pub const UPLOAD_NOTE: &str =
    "This is a first-pass summary and investment memo generated by a language model.";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    info(title = "CIM Analyzer API", description = "Upload CIMs, get structured investment insights."),
    paths(
        auth::register_handler,
        auth::login_handler,
        test_handler,
        upload_handler,
        list_results_handler,
        update_rating_handler,
        update_confidence_handler,
        delete_result_handler,
    ),
    components(
        schemas(
            RegisterRequest, LoginRequest, TokenResponse, MessageResponse, ErrorBody,
            UploadResponse, ResultResponse, RatingUpdate, ConfidenceUpdate,
            RatingResponse, ConfidenceResponse
        )
    ),
    modifiers(&SecurityAddon),
    security(("bearer_auth" = [])),
    tags(
        (name = "CIM Analyzer API", description = "Document analysis and feedback endpoints.")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// The response payload sent after a document has been analyzed and stored.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub id: i64,
    pub filename: String,
    pub message: String,
    pub preview_text: String,
    /// Raw model output; usually, but not necessarily, JSON.
    pub llm_analysis: String,
    pub note: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResultResponse {
    pub id: i64,
    pub filename: String,
    pub preview_text: String,
    pub summary_json: String,
    pub timestamp: DateTime<Utc>,
    pub user_rating: Option<f64>,
    pub confidence_score: Option<f64>,
}

impl From<AnalysisResult> for ResultResponse {
    fn from(r: AnalysisResult) -> Self {
        Self {
            id: r.id,
            filename: r.filename,
            preview_text: r.preview_text,
            summary_json: r.summary_json,
            timestamp: r.created_at,
            user_rating: r.user_rating,
            confidence_score: r.confidence_score,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RatingUpdate {
    pub rating: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct ConfidenceUpdate {
    pub confidence: f64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RatingResponse {
    pub message: String,
    pub rating: f64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConfidenceResponse {
    pub message: String,
    pub confidence: f64,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/test",
    security(()),
    responses((status = 200, description = "Backend is up", body = MessageResponse))
)]
pub async fn test_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("Backend is working!"))
}

/// Upload a CIM and analyze it.
///
/// Accepts a multipart/form-data request with a `file` part holding a PDF.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "The PDF to analyze, in a part named `file`."),
    responses(
        (status = 200, description = "Document analyzed and stored", body = UploadResponse),
        (status = 400, description = "Invalid upload or no readable content", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Insight analysis failed", body = ErrorBody)
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let upload = read_file_part(&mut multipart).await?;
    info!(user_id = %user.user_id, filename = %upload.filename, bytes = upload.bytes.len(), "Upload received");

    let report = state.pipeline.run(&user, upload).await?;

    Ok(Json(UploadResponse {
        id: report.result.id,
        preview_text: truncate_chars(&report.extracted_text, RESPONSE_PREVIEW_CHARS).to_string(),
        filename: report.result.filename,
        message: "File uploaded and analyzed!".to_string(),
        llm_analysis: report.result.summary_json,
        note: UPLOAD_NOTE.to_string(),
    }))
}

async fn read_file_part(multipart: &mut Multipart) -> Result<Upload, AnalysisError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AnalysisError::InvalidUpload(format!("Failed to read multipart data: {}", e))
    };
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(invalid)?;
        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(AnalysisError::InvalidUpload(
        "Multipart form must include a file".to_string(),
    ))
}

/// List the caller's results, newest first.
#[utoipa::path(
    get,
    path = "/api/results",
    responses(
        (status = 200, description = "The caller's results", body = [ResultResponse]),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn list_results_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ResultResponse>>, ApiError> {
    let results = state.results.list(&user.user_id).await?;
    Ok(Json(results.into_iter().map(ResultResponse::from).collect()))
}

/// Rate a result from 1 to 5.
#[utoipa::path(
    put,
    path = "/api/results/{id}/rating",
    params(("id" = i64, Path, description = "Result id")),
    request_body = RatingUpdate,
    responses(
        (status = 200, description = "Rating stored", body = RatingResponse),
        (status = 400, description = "Rating out of range", body = ErrorBody),
        (status = 404, description = "Result not found", body = ErrorBody)
    )
)]
pub async fn update_rating_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ResultId(result_id): ResultId,
    ValidatedJson(body): ValidatedJson<RatingUpdate>,
) -> Result<Json<RatingResponse>, ApiError> {
    let rating = state
        .results
        .rate(result_id, &user.user_id, body.rating)
        .await?;
    info!(result_id, user_id = %user.user_id, rating, "Rating updated");
    Ok(Json(RatingResponse {
        message: "Rating updated successfully".to_string(),
        rating,
    }))
}

/// Override a result's confidence score, from 0 to 1.
#[utoipa::path(
    put,
    path = "/api/results/{id}/confidence",
    params(("id" = i64, Path, description = "Result id")),
    request_body = ConfidenceUpdate,
    responses(
        (status = 200, description = "Confidence stored", body = ConfidenceResponse),
        (status = 400, description = "Confidence out of range", body = ErrorBody),
        (status = 404, description = "Result not found", body = ErrorBody)
    )
)]
pub async fn update_confidence_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ResultId(result_id): ResultId,
    ValidatedJson(body): ValidatedJson<ConfidenceUpdate>,
) -> Result<Json<ConfidenceResponse>, ApiError> {
    let confidence = state
        .results
        .set_confidence(result_id, &user.user_id, body.confidence)
        .await?;
    info!(result_id, user_id = %user.user_id, confidence, "Confidence updated");
    Ok(Json(ConfidenceResponse {
        message: "Confidence updated successfully".to_string(),
        confidence,
    }))
}

/// Delete one of the caller's results.
#[utoipa::path(
    delete,
    path = "/api/results/{id}",
    params(("id" = i64, Path, description = "Result id")),
    responses(
        (status = 200, description = "Result deleted", body = MessageResponse),
        (status = 404, description = "Result not found", body = ErrorBody)
    )
)]
pub async fn delete_result_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ResultId(result_id): ResultId,
) -> Result<Json<MessageResponse>, ApiError> {
    state.results.delete(result_id, &user.user_id).await?;
    info!(result_id, user_id = %user.user_id, "Result deleted");
    Ok(Json(MessageResponse::new("Result deleted successfully")))
}
