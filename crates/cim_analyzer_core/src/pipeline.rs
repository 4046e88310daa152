//! crates/cim_analyzer_core/src/pipeline.rs
//!
//! The upload-and-analyze pipeline: validate, extract, request insight, persist.
//! Authentication happens before a request ever reaches this module.

use crate::domain::{AnalysisReport, AuthenticatedUser, NewAnalysisResult, Upload};
use crate::error::AnalysisError;
use crate::ports::{DatabaseService, InsightService, PdfTextService};
use crate::upload::{
    sanitize_filename, select_pages, truncate_chars, validate_upload, STORED_PREVIEW_CHARS,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Composes the ports needed to turn an uploaded PDF into a stored result.
#[derive(Clone)]
pub struct AnalysisPipeline {
    db: Arc<dyn DatabaseService>,
    pdf: Arc<dyn PdfTextService>,
    insight: Arc<dyn InsightService>,
}

impl AnalysisPipeline {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        pdf: Arc<dyn PdfTextService>,
        insight: Arc<dyn InsightService>,
    ) -> Self {
        Self { db, pdf, insight }
    }

    /// Runs every stage in order. Nothing is written unless all stages succeed.
    pub async fn run(
        &self,
        user: &AuthenticatedUser,
        upload: Upload,
    ) -> Result<AnalysisReport, AnalysisError> {
        // 1. Validate the file before touching its contents
        let filename = sanitize_filename(&upload.filename).to_string();
        validate_upload(&filename, upload.bytes.len())?;

        // 2. Extract the qualifying text
        let pages = self.pdf.extract_selected_pages(&upload.bytes).await.map_err(|e| {
            warn!(filename = %filename, error = %e, "PDF text extraction failed");
            AnalysisError::InvalidUpload("The uploaded file could not be read as a PDF.".to_string())
        })?;
        let text = select_pages(pages)?;
        info!(
            filename = %filename,
            chars = text.chars().count(),
            "Extracted document text"
        );

        // 3. Ask the model for the insight payload
        let summary = self.insight.request_insight(&text).await.map_err(|e| {
            warn!(filename = %filename, error = %e, "Insight request failed");
            AnalysisError::InsightUnavailable(e.to_string())
        })?;

        // 4. Persist
        let result = self
            .db
            .create_result(NewAnalysisResult {
                user_id: user.user_id.clone(),
                filename,
                preview_text: truncate_chars(&text, STORED_PREVIEW_CHARS).to_string(),
                summary_json: summary,
            })
            .await?;
        info!(result_id = result.id, user_id = %user.user_id, "Stored analysis result");

        Ok(AnalysisReport {
            result,
            extracted_text: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;
    use crate::ports::{PortError, PortResult};
    use crate::upload::PageSelection;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Treats the bytes as UTF-8 with form feeds between pages.
    struct FormFeedPdf;

    #[async_trait]
    impl PdfTextService for FormFeedPdf {
        async fn extract_selected_pages(&self, pdf_bytes: &[u8]) -> PortResult<Vec<String>> {
            let text = std::str::from_utf8(pdf_bytes)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            let mut selection = PageSelection::new();
            for page in text.split('\u{c}') {
                if !selection.offer(page) {
                    break;
                }
            }
            Ok(selection.into_pages())
        }
    }

    struct FixedInsight {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl FixedInsight {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InsightService for FixedInsight {
        async fn request_insight(&self, _document_text: &str) -> PortResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| PortError::Unexpected("model unavailable".to_string()))
        }
    }

    fn user(id: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: id.to_string(),
        }
    }

    async fn pipeline_with(
        insight: Arc<FixedInsight>,
    ) -> (AnalysisPipeline, Arc<MemoryDatabase>) {
        let db = Arc::new(MemoryDatabase::new());
        db.get_or_create_user("alice").await.unwrap();
        let pipeline = AnalysisPipeline::new(db.clone(), Arc::new(FormFeedPdf), insight);
        (pipeline, db)
    }

    fn upload(name: &str, pages: &[String]) -> Upload {
        Upload {
            filename: name.to_string(),
            bytes: pages.join("\u{c}").into_bytes(),
        }
    }

    #[tokio::test]
    async fn stores_only_the_qualifying_page() {
        let insight = Arc::new(FixedInsight::ok(r#"{"SUMMARY": "ok"}"#));
        let (pipeline, db) = pipeline_with(insight).await;

        let short = "x".repeat(50);
        let long = format!("Revenue grew {}", "y".repeat(187));
        let report = pipeline
            .run(&user("alice"), upload("deal.pdf", &[short, long.clone()]))
            .await
            .unwrap();

        assert_eq!(report.extracted_text, long);
        assert_eq!(report.result.preview_text, long);
        assert_eq!(report.result.summary_json, r#"{"SUMMARY": "ok"}"#);
        assert_eq!(db.list_results_for_user("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preview_is_first_thousand_characters() {
        let insight = Arc::new(FixedInsight::ok("{}"));
        let (pipeline, _db) = pipeline_with(insight).await;

        let pages: Vec<String> = (0..3).map(|i| format!("{i}{}", "z".repeat(799))).collect();
        let report = pipeline
            .run(&user("alice"), upload("deal.pdf", &pages))
            .await
            .unwrap();

        assert_eq!(report.result.preview_text.chars().count(), STORED_PREVIEW_CHARS);
        assert!(report.extracted_text.starts_with(&report.result.preview_text));
    }

    #[tokio::test]
    async fn invalid_upload_never_reaches_the_model() {
        let insight = Arc::new(FixedInsight::ok("{}"));
        let (pipeline, db) = pipeline_with(insight.clone()).await;

        let err = pipeline
            .run(&user("alice"), upload("deal.txt", &["a".repeat(300)]))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidUpload(_)));
        assert_eq!(insight.calls.load(Ordering::SeqCst), 0);
        assert!(db.list_results_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_without_content_is_rejected() {
        let insight = Arc::new(FixedInsight::ok("{}"));
        let (pipeline, db) = pipeline_with(insight.clone()).await;

        let pages = vec![
            "short".to_string(),
            format!("Confidential {}", "c".repeat(300)),
        ];
        let err = pipeline
            .run(&user("alice"), upload("deal.pdf", &pages))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::NoContent));
        assert_eq!(insight.calls.load(Ordering::SeqCst), 0);
        assert!(db.list_results_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_pdf_is_an_invalid_upload() {
        let insight = Arc::new(FixedInsight::ok("{}"));
        let (pipeline, _db) = pipeline_with(insight).await;

        let err = pipeline
            .run(
                &user("alice"),
                Upload {
                    filename: "deal.pdf".to_string(),
                    bytes: vec![0xff, 0xfe, 0x00],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidUpload(_)));
    }

    #[tokio::test]
    async fn insight_failure_persists_nothing() {
        let insight = Arc::new(FixedInsight::failing());
        let (pipeline, db) = pipeline_with(insight).await;

        let err = pipeline
            .run(&user("alice"), upload("deal.pdf", &["r".repeat(400)]))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InsightUnavailable(_)));
        assert!(db.list_results_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filename_is_stored_without_directories() {
        let insight = Arc::new(FixedInsight::ok("{}"));
        let (pipeline, _db) = pipeline_with(insight).await;

        let report = pipeline
            .run(&user("alice"), upload("uploads/q3/deal.pdf", &["r".repeat(400)]))
            .await
            .unwrap();

        assert_eq!(report.result.filename, "deal.pdf");
    }
}
