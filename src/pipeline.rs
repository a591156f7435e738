//! Batch operations: full pipeline, listing and reporting
//!
//! A failure to extract or summarize one paper (or to reach the model for it)
//! is recorded and the batch moves on. Storage and config errors abort.

use crate::cache::CacheEntry;
use crate::error::{Error, Result};
use crate::models::{Category, PaperSummary};
use crate::papers::{discover_pdfs, TextExtractor};
use crate::policy::PolicyEngine;
use crate::report::build_report;
use crate::summarizer::Summarizer;
use crate::utils::preview;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A paper that made it through classification
#[derive(Debug, Clone)]
pub struct Classified {
    /// Input file for pipeline runs, cache key for listings
    pub source: String,
    pub title: String,
    pub category: Category,
}

/// A paper that was skipped because of an item-level error
#[derive(Debug)]
pub struct Failure {
    pub source: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub classified: Vec<Classified>,
    pub failures: Vec<Failure>,
}

/// Keep item-level errors in `failures`, pass everything else up
fn isolate<T>(result: Result<T>, source: &str, failures: &mut Vec<Failure>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_item_level() => {
            tracing::warn!(source = %source, "skipping: {}", error);
            failures.push(Failure { source: source.to_string(), error });
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Summarize every PDF in `pdfs_dir`, then classify every summary
pub fn run_full_pipeline(
    pdfs_dir: &Path,
    extractor: &dyn TextExtractor,
    summarizer: &Summarizer<'_>,
    engine: &PolicyEngine<'_>,
    context: &BTreeMap<String, String>,
) -> Result<BatchOutcome> {
    let pdfs = discover_pdfs(pdfs_dir)?;
    let total = pdfs.len();
    tracing::info!("Processing {} PDFs from {}", total, pdfs_dir.display());

    let mut outcome = BatchOutcome::default();
    let mut summarized: Vec<(PathBuf, PaperSummary)> = Vec::with_capacity(total);

    for (i, pdf) in pdfs.into_iter().enumerate() {
        let source = pdf.display().to_string();
        tracing::info!("[{}/{}] Summarizing {}", i + 1, total, source);

        let Some(text) = isolate(extractor.extract_text(&pdf), &source, &mut outcome.failures)? else {
            continue;
        };
        tracing::debug!(chars = text.len(), "extracted: {}", preview(&text, 120));

        if let Some(summary) = isolate(summarizer.summarize(&text, context), &source, &mut outcome.failures)? {
            summarized.push((pdf, summary));
        }
    }

    let total = summarized.len();
    for (i, (pdf, paper)) in summarized.into_iter().enumerate() {
        let source = pdf.display().to_string();
        tracing::info!("[{}/{}] Evaluating paper: {}", i + 1, total, paper.title);

        if let Some(category) = isolate(engine.evaluate(&paper), &source, &mut outcome.failures)? {
            tracing::info!("Paper: {} -> Category: {}", paper.title, category);
            outcome.classified.push(Classified { source, title: paper.title, category });
        }
    }

    tracing::info!(
        "Pipeline finished: {} classified, {} failed",
        outcome.classified.len(),
        outcome.failures.len()
    );
    Ok(outcome)
}

/// Classify every cached summary
pub fn list_processed(summarizer: &Summarizer<'_>, engine: &PolicyEngine<'_>) -> Result<BatchOutcome> {
    let papers = summarizer.cached_summaries()?;
    let mut outcome = BatchOutcome::default();

    for CacheEntry { key, value: paper } in papers {
        if let Some(category) = isolate(engine.evaluate(&paper), &key, &mut outcome.failures)? {
            outcome.classified.push(Classified { source: key, title: paper.title, category });
        }
    }
    Ok(outcome)
}

/// Build the report over every cached summary and write it into `reports_dir`
pub fn generate_report(summarizer: &Summarizer<'_>, engine: &PolicyEngine<'_>, reports_dir: &Path) -> Result<PathBuf> {
    let papers = summarizer.cached_summaries()?;
    tracing::info!("Building report for {} papers x {} rules", papers.len(), engine.rules().len());

    let report = build_report(&papers, engine.rules(), |paper, rule| engine.check_condition(paper, rule))?;
    let path = report.write_to(reports_dir)?;

    tracing::info!("Report saved to {}", path.display());
    Ok(path)
}
