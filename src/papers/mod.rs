//! Input side of the pipeline: finding PDFs and pulling their text
//!
//! Extraction sits behind [`TextExtractor`] so the pipeline does not care
//! whether text comes from pdf-extract or somewhere else.

pub mod pdf_extractor;

pub use pdf_extractor::PdfExtractor;

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Turns an input document into plain text
pub trait TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// All `*.pdf` files directly inside `dir`, sorted by file name
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::storage(dir, e))?;

    let mut pdfs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::storage(dir, e))?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_pdfs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.json"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let names: Vec<String> = discover_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_discover_pdfs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover_pdfs(&dir.path().join("nope")), Err(Error::Storage { .. })));
    }
}
