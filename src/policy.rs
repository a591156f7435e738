//! Rule-based policy engine
//!
//! Rules are checked in their configured order and the first rule whose
//! condition passes decides the category. Each `(rule, paper)` check is cached
//! in the conditions folder, so re-running a classification or building a
//! report costs no model calls for pairs already evaluated.

use crate::cache::ContentCache;
use crate::error::Result;
use crate::llm::{complete_structured, LlmClient};
use crate::models::{Category, ConditionRecord, ConditionResult, PaperSummary, Rule};
use crate::settings::ConditionKeying;

pub struct PolicyEngine<'a> {
    rules: Vec<Rule>,
    cache: ContentCache,
    client: &'a dyn LlmClient,
    keying: ConditionKeying,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(rules: Vec<Rule>, cache: ContentCache, client: &'a dyn LlmClient) -> Self {
        Self { rules, cache, client, keying: ConditionKeying::Title }
    }

    pub fn with_keying(mut self, keying: ConditionKeying) -> Self {
        self.keying = keying;
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Category of the first rule whose condition passes, `Uncategorized` otherwise
    pub fn evaluate(&self, paper: &PaperSummary) -> Result<Category> {
        for (i, rule) in self.rules.iter().enumerate() {
            let result = self.check_condition(paper, rule)?;
            tracing::debug!(
                rule = i + 1,
                category = %rule.category,
                passes = result.condition_passes,
                "checked condition \"{}\"",
                rule.condition
            );
            if result.condition_passes {
                return Ok(Category::Matched(rule.category.clone()));
            }
        }
        Ok(Category::Uncategorized)
    }

    /// Evaluate one rule's condition against a paper's summary
    pub fn check_condition(&self, paper: &PaperSummary, rule: &Rule) -> Result<ConditionResult> {
        let material = self.key_material(paper, rule);
        let record: ConditionRecord = self.cache.get_or_compute(&material, || {
            let system_prompt = format!(
                "You are an AI agent determining if the following condition passes: {}. \
                 Provide the result as a JSON with the key 'condition_passes' as a boolean \
                 and 'relevant_snippets' as a list of passages from the summary supporting the decision.",
                rule.agent_context
            );
            let condition_result =
                complete_structured::<ConditionResult>(self.client, &system_prompt, &paper.summary)?;

            Ok(ConditionRecord {
                paper_title: paper.title.clone(),
                condition_text: rule.condition.clone(),
                condition_result,
            })
        })?;

        Ok(record.condition_result)
    }

    fn key_material(&self, paper: &PaperSummary, rule: &Rule) -> Vec<u8> {
        let mut material = serde_json::to_string(rule).unwrap_or_default().into_bytes();
        match self.keying {
            ConditionKeying::Title => material.extend_from_slice(paper.title.as_bytes()),
            ConditionKeying::Summary => {
                material.extend(serde_json::to_string(paper).unwrap_or_default().into_bytes())
            }
        }
        material
    }
}
