//! Report composer
//!
//! One row per cached paper: flattened metadata followed by a `pass` /
//! `not pass` column for every rule. Rule outcomes come from the policy
//! engine's condition cache, so papers that were already classified cost no
//! model calls here. The table is written as `report_<timestamp>.csv`.

use crate::cache::CacheEntry;
use crate::error::{Error, Result};
use crate::models::{ConditionResult, PaperSummary, Rule};
use crate::utils::join_list;
use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const PASS: &str = "pass";
pub const NOT_PASS: &str = "not pass";

/// Metadata columns, in output order
pub const METADATA_COLUMNS: &[&str] = &[
    "paper_title",
    "cache_key",
    "summary",
    "publication_date",
    "authors",
    "quality",
    "populations",
    "disorder_subtype",
    "treatment_type",
    "evidence_level",
    "date",
];

/// A composed report table
#[derive(Debug, Clone)]
pub struct Report {
    pub columns: Vec<String>,
    /// Column names holding rule outcomes, in rule order
    pub rule_columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column name for a rule condition: spaces to underscores, quotes dropped, lowercased
pub fn condition_slug(condition: &str) -> String {
    condition
        .replace(' ', "_")
        .replace(['\'', '"'], "")
        .to_lowercase()
}

/// Slugs for every rule, suffixed where they would collide with an earlier column
fn rule_column_names(rules: &[Rule]) -> Vec<String> {
    let mut taken: Vec<String> = METADATA_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut names = Vec::with_capacity(rules.len());

    for rule in rules {
        let slug = condition_slug(&rule.condition);
        let mut name = slug.clone();
        let mut n = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", slug, n);
            n += 1;
        }
        taken.push(name.clone());
        names.push(name);
    }
    names
}

/// Build the papers x rules table
pub fn build_report<F>(papers: &[CacheEntry<PaperSummary>], rules: &[Rule], mut evaluate_condition: F) -> Result<Report>
where
    F: FnMut(&PaperSummary, &Rule) -> Result<ConditionResult>,
{
    let rule_columns = rule_column_names(rules);
    let mut columns: Vec<String> = METADATA_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(rule_columns.iter().cloned());

    let date = Local::now().format("%Y-%m-%d").to_string();
    let mut rows = Vec::with_capacity(papers.len());

    for entry in papers {
        let paper = &entry.value;
        let mut row = vec![
            paper.title.clone(),
            entry.key.clone(),
            paper.summary.clone(),
            paper.publication_date.clone(),
            join_list(&paper.authors),
            paper.quality.clone(),
            serde_json::to_string(&paper.populations).unwrap_or_default(),
            join_list(&paper.disorder_subtype),
            join_list(&paper.treatment_type),
            join_list(&paper.evidence_level),
            date.clone(),
        ];

        for rule in rules {
            let result = evaluate_condition(paper, rule)?;
            row.push(if result.condition_passes { PASS } else { NOT_PASS }.to_string());
        }
        rows.push(row);
    }

    Ok(Report { columns, rule_columns, rows })
}

impl Report {
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, &self.columns);
        for row in &self.rows {
            push_csv_line(&mut out, row);
        }
        out
    }

    /// Write the report into `dir` as `report_YYYY-MM-DD_HH-MM-SS.csv`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        self.write_at(dir, &Local::now())
    }

    /// Never overwrites: a name already taken gets `_2`, `_3`, ... appended
    fn write_at(&self, dir: &Path, now: &DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
        let content = self.to_csv();

        let mut attempt = 1;
        loop {
            let path = dir.join(numbered_file_name(now, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).map_err(|e| Error::storage(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(Error::storage(&path, e)),
            }
        }
    }
}

pub fn report_file_name(now: &DateTime<Local>) -> String {
    numbered_file_name(now, 1)
}

fn numbered_file_name(now: &DateTime<Local>, attempt: u32) -> String {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S");
    if attempt <= 1 {
        format!("report_{}.csv", stamp)
    } else {
        format!("report_{}_{}.csv", stamp, attempt)
    }
}

fn push_csv_line(out: &mut String, fields: &[String]) {
    let line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push('\n');
}

/// Quote a field if it contains a delimiter, quote or line break
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
