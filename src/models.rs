//! Structured records exchanged with the model and persisted in the caches
//!
//! `PaperSummary` and `ConditionResult` double as the JSON schemas the model
//! must answer with, so every field here is part of the wire contract.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category returned when no rule matches a paper
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One inclusion/exclusion/other criterion of a study population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Detail {
    pub detail: String,
    pub value: String,
    pub description: String,
}

/// A studied population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Demographics {
    #[serde(default)]
    pub population_size: Option<i64>,
    #[serde(default)]
    pub min_age: Option<i64>,
    #[serde(default)]
    pub max_age: Option<i64>,
    #[serde(default)]
    pub gender: Option<i64>,
    pub inclusion_criteria: Vec<Detail>,
    pub exclusion_criteria: Vec<Detail>,
    pub other_details: Vec<Detail>,
}

/// Structured summary of one paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PaperSummary {
    pub title: String,
    pub summary: String,
    pub publication_date: String,
    pub authors: Vec<String>,
    /// Free-form quality classification, shaped by the rules' agent context
    pub quality: String,
    pub populations: Vec<Demographics>,
    pub disorder_subtype: Vec<String>,
    pub treatment_type: Vec<String>,
    pub evidence_level: Vec<String>,
}

/// Outcome of evaluating one rule condition against one paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ConditionResult {
    pub condition_passes: bool,
    pub relevant_snippets: Vec<String>,
}

/// What gets written to `conditions/<hash>.json`.
/// Only `condition_result` is read back; the rest is there for audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRecord {
    #[serde(default)]
    pub paper_title: String,
    #[serde(default)]
    pub condition_text: String,
    pub condition_result: ConditionResult,
}

/// A categorization rule. Rules are evaluated in file order, first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub category: String,
    pub condition: String,
    pub agent_context: String,
}

/// Result of running a paper through the policy engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Matched(String),
    Uncategorized,
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Matched(label) => label,
            Category::Uncategorized => UNCATEGORIZED,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Category::Matched(_))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
pub(crate) fn sample_paper(title: &str) -> PaperSummary {
    PaperSummary {
        title: title.to_string(),
        summary: format!("{} examines CBT for adolescents with anxiety.", title),
        publication_date: "2021-03-14".to_string(),
        authors: vec!["A. Researcher".to_string(), "B. Clinician".to_string()],
        quality: "RCT".to_string(),
        populations: vec![Demographics {
            population_size: Some(120),
            min_age: Some(12),
            max_age: Some(17),
            gender: None,
            inclusion_criteria: vec![Detail {
                detail: "diagnosis".to_string(),
                value: "GAD".to_string(),
                description: "Generalized anxiety disorder per DSM-5".to_string(),
            }],
            exclusion_criteria: vec![],
            other_details: vec![],
        }],
        disorder_subtype: vec!["GAD".to_string()],
        treatment_type: vec!["CBT".to_string()],
        evidence_level: vec!["Level II".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Matched("Include".into()).to_string(), "Include");
        assert_eq!(Category::Uncategorized.to_string(), "Uncategorized");
        assert!(!Category::Uncategorized.is_matched());
    }

    #[test]
    fn test_demographics_missing_optionals_deserialize_as_none() {
        let raw = r#"{
            "inclusion_criteria": [],
            "exclusion_criteria": [],
            "other_details": [{"detail": "site", "value": "3", "description": "clinics"}]
        }"#;
        let demo: Demographics = serde_json::from_str(raw).unwrap();
        assert_eq!(demo.population_size, None);
        assert_eq!(demo.other_details[0].value, "3");
    }

    #[test]
    fn test_paper_summary_rejects_wrong_shape() {
        // authors must be a list, not a string
        let raw = r#"{
            "title": "t", "summary": "s", "publication_date": "2020",
            "authors": "Someone", "quality": "low", "populations": [],
            "disorder_subtype": [], "treatment_type": [], "evidence_level": []
        }"#;
        assert!(serde_json::from_str::<PaperSummary>(raw).is_err());
    }

    #[test]
    fn test_model_records_reject_unknown_keys() {
        let extra = r#"{"condition_passes": true, "relevant_snippets": [], "confidence": "high"}"#;
        assert!(serde_json::from_str::<ConditionResult>(extra).is_err());

        let extra = r#"{"detail": "site", "value": "3", "description": "clinics", "confidence": 0.9}"#;
        assert!(serde_json::from_str::<Detail>(extra).is_err());

        let mut paper = serde_json::to_value(sample_paper("Trial")).unwrap();
        paper["populations"][0]["ethnicity"] = serde_json::json!("mixed");
        assert!(serde_json::from_value::<PaperSummary>(paper).is_err());
    }

    #[test]
    fn test_condition_record_reads_result_only() {
        let raw = r#"{"condition_result": {"condition_passes": true, "relevant_snippets": ["n=120"]}}"#;
        let record: ConditionRecord = serde_json::from_str(raw).unwrap();
        assert!(record.condition_result.condition_passes);
        assert!(record.paper_title.is_empty());
    }
}
