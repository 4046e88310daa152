//! crates/cim_analyzer_core/src/upload.rs
//!
//! Validation of incoming files and selection of the pages that feed the
//! insight request.

use crate::error::AnalysisError;

pub const MAX_FILENAME_CHARS: usize = 100;
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// A page must be strictly longer than this (after trimming) to qualify.
pub const MIN_PAGE_CHARS: usize = 100;
pub const MAX_SELECTED_PAGES: usize = 10;
pub const PAGE_SEPARATOR: &str = "\n\n";
/// Length of the preview persisted with each result.
pub const STORED_PREVIEW_CHARS: usize = 1000;

const SKIPPED_PAGE_PREFIX: &str = "confidential";

/// Reduces a client-supplied filename to its final path component.
pub fn sanitize_filename(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw)
}

/// Checks the filename and size constraints. No parsing happens here.
pub fn validate_upload(filename: &str, byte_len: usize) -> Result<(), AnalysisError> {
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(AnalysisError::InvalidUpload(
            "Only PDF files are allowed.".to_string(),
        ));
    }
    if filename.chars().count() > MAX_FILENAME_CHARS {
        return Err(AnalysisError::InvalidUpload(
            "Filename is too long.".to_string(),
        ));
    }
    if byte_len > MAX_UPLOAD_BYTES {
        return Err(AnalysisError::InvalidUpload(
            "File too large (limit 5MB)".to_string(),
        ));
    }
    Ok(())
}

fn is_qualifying_page(text: &str) -> bool {
    let starts_confidential = text
        .get(..SKIPPED_PAGE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SKIPPED_PAGE_PREFIX));
    text.chars().count() > MIN_PAGE_CHARS && !starts_confidential
}

/// Accumulates qualifying pages one at a time, so a caller extracting text
/// page by page can stop as soon as the selection is full.
#[derive(Debug, Default)]
pub struct PageSelection {
    pages: Vec<String>,
}

impl PageSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers the next page in document order. Returns `false` once
    /// `MAX_SELECTED_PAGES` pages have been kept and no more are wanted.
    pub fn offer(&mut self, raw: &str) -> bool {
        if self.is_full() {
            return false;
        }
        // Postgres TEXT cannot hold NUL.
        let without_nul = raw.replace('\0', "");
        let clean = without_nul.trim();
        if is_qualifying_page(clean) {
            self.pages.push(clean.to_string());
        }
        !self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.pages.len() >= MAX_SELECTED_PAGES
    }

    pub fn into_pages(self) -> Vec<String> {
        self.pages
    }
}

/// Walks the pages in order, keeping trimmed pages that carry real content,
/// and joins the first `MAX_SELECTED_PAGES` of them with a blank line.
///
/// The iterator is not advanced past the last page that is needed.
pub fn select_pages<I, S>(pages: I) -> Result<String, AnalysisError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selection = PageSelection::new();
    for page in pages {
        if !selection.offer(page.as_ref()) {
            break;
        }
    }

    let text = selection.into_pages().join(PAGE_SEPARATOR);
    if text.trim().is_empty() {
        return Err(AnalysisError::NoContent);
    }
    Ok(text)
}

/// Returns at most the first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
