//! PDF text extraction wrapper
//!
//! Wraps pdf-extract crate with error handling for:
//! - Files that are not PDFs
//! - Encrypted or corrupted PDFs
//! - Scanned/image-only PDFs (no text layer)

use super::TextExtractor;
use crate::error::{Error, Result};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Extractor backed by the pdf-extract crate
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::Extraction {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;
        extract_text_from_pdf(&bytes).map_err(|message| Error::Extraction { path: path.to_path_buf(), message })
    }
}

/// Extract full text from PDF bytes
///
/// Returns error for non-PDF, encrypted or scanned PDFs
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> std::result::Result<String, String> {
    // Validate PDF magic bytes
    if pdf_bytes.len() < 4 || &pdf_bytes[0..4] != b"%PDF" {
        return Err("Not a PDF file".to_string());
    }

    // pdf-extract panics on some malformed font tables
    let text = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(pdf_bytes)))
        .map_err(|_| "PDF parser crashed on malformed input".to_string())?
        .map_err(|e| format!("Failed to extract text: {}", e))?;

    if text.trim().is_empty() {
        return Err("No text layer (scanned or image-only PDF?)".to_string());
    }

    Ok(text)
}
