//! Paper summarizer
//!
//! Turns extracted PDF text into a `PaperSummary`. Summaries are cached by
//! `(text, context)`, so the same paper under the same guidance is only ever
//! sent to the model once. The paper title plays no part in the key.

use crate::cache::{CacheEntry, ContentCache};
use crate::error::Result;
use crate::llm::{complete_structured, LlmClient};
use crate::models::{PaperSummary, Rule};
use std::collections::BTreeMap;

pub struct Summarizer<'a> {
    cache: ContentCache,
    client: &'a dyn LlmClient,
    /// Every rule's agent context, one per line
    guidance: String,
}

impl<'a> Summarizer<'a> {
    pub fn new(cache: ContentCache, client: &'a dyn LlmClient, rules: &[Rule]) -> Self {
        let guidance = rules
            .iter()
            .map(|r| r.agent_context.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self { cache, client, guidance }
    }

    /// Cache key material: the text followed by the context as canonical JSON
    pub fn key_material(text: &str, context: &BTreeMap<String, String>) -> Vec<u8> {
        let mut material = text.as_bytes().to_vec();
        // BTreeMap serializes in key order
        material.extend(serde_json::to_string(context).unwrap_or_default().into_bytes());
        material
    }

    pub fn summarize(&self, text: &str, context: &BTreeMap<String, String>) -> Result<PaperSummary> {
        self.cache.get_or_compute(&Self::key_material(text, context), || {
            let system_prompt = self.system_prompt(context);
            tracing::debug!(chars = text.len(), "requesting paper summary");
            complete_structured::<PaperSummary>(self.client, &system_prompt, text)
        })
    }

    /// Cache key under which `summarize` stores the summary for these inputs
    pub fn cache_key(text: &str, context: &BTreeMap<String, String>) -> String {
        ContentCache::key_for(&Self::key_material(text, context))
    }

    /// Every summary currently in the cache, sorted by cache key
    pub fn cached_summaries(&self) -> Result<Vec<CacheEntry<PaperSummary>>> {
        self.cache.entries()
    }

    fn system_prompt(&self, context: &BTreeMap<String, String>) -> String {
        let mut prompt = format!(
            "You are an AI summarizing research papers. Use the following context to guide your summary:\n{}",
            self.guidance
        );
        for (key, value) in context {
            prompt.push_str(&format!("\n{}: {}", key, value));
        }
        prompt
    }
}
