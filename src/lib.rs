//! Literature review policy engine
//!
//! Summarizes scientific PDFs with an LLM, sorts them into categories with an
//! ordered list of natural-language rules and writes CSV reports. Summaries
//! and rule evaluations are cached on disk by content hash so nothing is sent
//! to the model twice.

pub mod cache;
pub mod error;
pub mod llm;
pub mod logging;
pub mod models;
pub mod papers;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod settings;
pub mod summarizer;
pub mod utils;

pub use error::{Error, Result};
