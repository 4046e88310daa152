//! services/api/src/adapters/pdf.rs
//!
//! Implements the `PdfTextService` port with the `pdf-extract` crate.

use async_trait::async_trait;
use cim_analyzer_core::ports::{PdfTextService, PortError, PortResult};
use cim_analyzer_core::upload::PageSelection;
use pdf_extract::{Document, OutputError, PlainTextOutput};
use tracing::debug;

/// Extracts per-page text on the blocking thread pool.
#[derive(Clone, Default)]
pub struct PdfExtractAdapter;

impl PdfExtractAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Loads the document once and renders pages in order until the selection
/// is full. Later pages are never parsed.
fn extract_until_full(bytes: &[u8]) -> Result<(Vec<String>, u32), OutputError> {
    let mut doc = Document::load_mem(bytes)?;
    if doc.is_encrypted() {
        doc.decrypt("")?;
    }

    let mut selection = PageSelection::new();
    let mut parsed = 0;
    for page_num in doc.get_pages().into_keys() {
        let mut text = String::new();
        {
            let mut output = PlainTextOutput::new(&mut text);
            pdf_extract::output_doc_page(&doc, &mut output, page_num)?;
        }
        parsed += 1;
        if !selection.offer(&text) {
            break;
        }
    }
    Ok((selection.into_pages(), parsed))
}

#[async_trait]
impl PdfTextService for PdfExtractAdapter {
    async fn extract_selected_pages(&self, pdf_bytes: &[u8]) -> PortResult<Vec<String>> {
        let bytes = pdf_bytes.to_vec();
        // pdf-extract can panic on malformed input; that arrives here as a JoinError.
        let (pages, parsed) = tokio::task::spawn_blocking(move || extract_until_full(&bytes))
            .await
            .map_err(|e| PortError::Unexpected(format!("PDF extraction aborted: {}", e)))?
            .map_err(|e| PortError::Unexpected(format!("Failed to parse PDF: {}", e)))?;

        debug!(parsed, selected = pages.len(), "Extracted PDF pages");
        Ok(pages)
    }
}
