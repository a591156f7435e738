//! Error types shared by the cache, summarizer, policy engine and report composer
//!
//! Errors fall into two groups:
//! - item-level (extraction, model output, transport): isolated to a single paper
//!   so a batch run can continue
//! - fatal (storage, corrupt cache entry, config): surfaced immediately

use std::path::{Path, PathBuf};

/// Errors produced by the literature review library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cache, report or config directory could not be read or written.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored artifact exists but does not parse as the expected type.
    #[error("corrupt cache entry {path}: {source}")]
    CorruptEntry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// PDF text could not be extracted.
    #[error("failed to extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The model response did not conform to the requested schema.
    #[error("model output for {schema} rejected: {message}")]
    ModelOutput { schema: String, message: String },

    /// The LLM service could not be reached or kept failing after retries.
    #[error("LLM request failed: {0}")]
    Transport(String),

    /// Missing or malformed rules / settings, or a request the LLM service refuses
    /// outright (bad API key, unknown model, rejected schema).
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn storage(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Storage { path: path.as_ref().to_path_buf(), source }
    }

    /// Whether this error should be isolated to the paper being processed
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Error::Extraction { .. } | Error::ModelOutput { .. } | Error::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_level_classification() {
        let extraction = Error::Extraction { path: "a.pdf".into(), message: "encrypted".into() };
        let output = Error::ModelOutput { schema: "PaperSummary".into(), message: "bad".into() };
        assert!(extraction.is_item_level());
        assert!(output.is_item_level());
        assert!(Error::Transport("timeout".into()).is_item_level());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!Error::storage("literature/parsed", io).is_item_level());
        assert!(!Error::Config("no rules".into()).is_item_level());
    }

    #[test]
    fn test_storage_message_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::storage("literature/parsed/abc.json", io);
        assert!(err.to_string().contains("literature/parsed/abc.json"));
    }
}
