//! Configuration: folder layout, settings file, API key and rules loading
//!
//! Everything is passed around explicitly. `Settings` is read from
//! `literature/settings.json` when present, defaults otherwise.

use crate::error::{Error, Result};
use crate::models::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable that takes precedence over the stored API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Folder layout of a literature workspace
#[derive(Debug, Clone)]
pub struct LiteraturePaths {
    pub root: PathBuf,
    pub pdfs: PathBuf,
    pub parsed: PathBuf,
    pub conditions: PathBuf,
    pub reports: PathBuf,
    pub logs: PathBuf,
    pub policy_file: PathBuf,
    pub settings_file: PathBuf,
}

impl LiteraturePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            pdfs: root.join("pdfs"),
            parsed: root.join("parsed"),
            conditions: root.join("conditions"),
            reports: root.join("reports"),
            logs: root.join("logs"),
            policy_file: root.join("policy.json"),
            settings_file: root.join("settings.json"),
            root,
        }
    }

    /// Create the cache, report and log folders if missing
    pub fn ensure_folders_exist(&self) -> Result<()> {
        for folder in [&self.parsed, &self.conditions, &self.reports, &self.logs] {
            fs::create_dir_all(folder).map_err(|e| Error::storage(folder, e))?;
        }
        Ok(())
    }

    pub fn cache_dir(&self, target: CacheTarget) -> &Path {
        match target {
            CacheTarget::Parsed => &self.parsed,
            CacheTarget::Conditions => &self.conditions,
        }
    }
}

impl Default for LiteraturePaths {
    fn default() -> Self {
        Self::new("./literature")
    }
}

/// The two cache folders that can be cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTarget {
    Parsed,
    Conditions,
}

impl CacheTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTarget::Parsed => "parsed",
            CacheTarget::Conditions => "conditions",
        }
    }
}

/// What identifies a paper in the condition cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKeying {
    /// Rule + paper title. Two papers sharing a title share results.
    #[default]
    Title,
    /// Rule + the full serialized summary
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Retries for transient failures only (timeouts, 429, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub condition_cache_key: ConditionKeying,
    /// Guidance handed to the summarizer; also part of the summary cache key
    #[serde(default = "default_context")]
    pub context: BTreeMap<String, String>,
}

fn default_model() -> String {
    "gpt-4o-2024-08-06".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_context() -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    context.insert(
        "quality_criteria".to_string(),
        "Quality is determined based on the type of evidence, such as systematic reviews, RCTs, \
         and expert opinions. Additional factors include methodological rigor and sample size."
            .to_string(),
    );
    context
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: default_model(),
            api_base: default_api_base(),
            request_timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            condition_cache_key: ConditionKeying::default(),
            context: default_context(),
        }
    }
}

impl Settings {
    /// Load settings from disk or fall back to defaults if the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(Error::storage(path, e)),
        };

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// API key: environment variable first, then the stored setting
    pub fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.openai_api_key.clone().filter(|k| !k.is_empty())
    }
}

/// Load the ordered rule list from a JSON array
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read rules from {}: {}", path.display(), e)))?;

    let rules: Vec<Rule> = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse rules in {}: {}", path.display(), e)))?;

    if rules.is_empty() {
        return Err(Error::Config(format!("No rules defined in {}", path.display())));
    }
    if let Some(pos) = rules.iter().position(|r| r.category.trim().is_empty()) {
        return Err(Error::Config(format!("Rule #{} in {} has an empty category", pos + 1, path.display())));
    }

    Ok(rules)
}
