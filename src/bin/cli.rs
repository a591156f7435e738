//! litreview CLI - summarize and classify a folder of scientific PDFs
//!
//! Usage: litreview [OPTIONS] <COMMAND>
//!
//! Works on a literature folder (default ./literature):
//!   pdfs/        input PDFs
//!   parsed/      cached paper summaries
//!   conditions/  cached rule evaluations
//!   reports/     CSV reports
//!   policy.json  ordered rules

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use litreview_lib::cache::ContentCache;
use litreview_lib::llm::{LlmClient, OpenAiClient, StructuredRequest};
use litreview_lib::models::Rule;
use litreview_lib::papers::PdfExtractor;
use litreview_lib::pipeline::{self, BatchOutcome};
use litreview_lib::policy::PolicyEngine;
use litreview_lib::settings::{self, CacheTarget, LiteraturePaths, Settings, API_KEY_ENV};
use litreview_lib::summarizer::Summarizer;
use litreview_lib::{logging, Error};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "litreview")]
#[command(version, about = "Literature review policy engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Literature folder holding pdfs/, parsed/, conditions/, reports/ and policy.json
    #[arg(long, global = true, default_value = "./literature")]
    literature_dir: PathBuf,

    /// Model to use instead of the one in settings.json
    #[arg(long, global = true)]
    model: Option<String>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize every PDF in pdfs/ and classify the results
    #[command(alias = "full-pipeline")]
    Run,
    /// List processed papers and their categories
    List,
    /// Write a CSV report of all processed papers
    Report,
    /// Clear cached summaries or condition evaluations
    Clear {
        /// Cache to clear
        #[arg(value_enum)]
        target: ClearTarget,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClearTarget {
    Parsed,
    Conditions,
}

impl From<ClearTarget> for CacheTarget {
    fn from(target: ClearTarget) -> Self {
        match target {
            ClearTarget::Parsed => CacheTarget::Parsed,
            ClearTarget::Conditions => CacheTarget::Conditions,
        }
    }
}

/// Stands in for the model when no API key is configured, so cached
/// listings and reports still work offline.
struct MissingApiKey;

impl LlmClient for MissingApiKey {
    fn complete(&self, _request: &StructuredRequest<'_>) -> litreview_lib::Result<String> {
        Err(Error::Config(format!("{} not set; only cached results are available", API_KEY_ENV)))
    }
}

/// Settings, rules and model client for one invocation
struct Workspace {
    paths: LiteraturePaths,
    settings: Settings,
    rules: Vec<Rule>,
    client: Box<dyn LlmClient>,
}

impl Workspace {
    fn open(paths: LiteraturePaths, model: Option<String>) -> anyhow::Result<Self> {
        let mut settings = Settings::load(&paths.settings_file)?;
        if let Some(model) = model {
            settings.model = model;
        }

        let rules = settings::load_rules(&paths.policy_file)?;
        tracing::info!("Loaded {} rules from {}", rules.len(), paths.policy_file.display());

        let client: Box<dyn LlmClient> = match settings.api_key() {
            Some(key) => Box::new(OpenAiClient::new(key, &settings)?),
            None => {
                tracing::warn!("{} not set; using cached results only", API_KEY_ENV);
                Box::new(MissingApiKey)
            }
        };

        Ok(Self { paths, settings, rules, client })
    }

    fn summarizer(&self) -> Summarizer<'_> {
        Summarizer::new(ContentCache::new(&self.paths.parsed), self.client.as_ref(), &self.rules)
    }

    fn engine(&self) -> PolicyEngine<'_> {
        PolicyEngine::new(self.rules.clone(), ContentCache::new(&self.paths.conditions), self.client.as_ref())
            .with_keying(self.settings.condition_cache_key)
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    run_cli(cli)
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let Cli { literature_dir, model, json, verbose, command } = cli;

    match command {
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "litreview", &mut std::io::stdout());
            Ok(())
        }
        Commands::Clear { target } => {
            let paths = prepare(&literature_dir, verbose)?;
            handle_clear(&paths, target.into())
        }
        Commands::Run => {
            let workspace = Workspace::open(prepare(&literature_dir, verbose)?, model)?;
            let outcome = pipeline::run_full_pipeline(
                &workspace.paths.pdfs,
                &PdfExtractor,
                &workspace.summarizer(),
                &workspace.engine(),
                &workspace.settings.context,
            )?;
            print_outcome(&outcome, json)
        }
        Commands::List => {
            let workspace = Workspace::open(prepare(&literature_dir, verbose)?, model)?;
            let outcome = pipeline::list_processed(&workspace.summarizer(), &workspace.engine())?;
            print_outcome(&outcome, json)
        }
        Commands::Report => {
            let workspace = Workspace::open(prepare(&literature_dir, verbose)?, model)?;
            let path = pipeline::generate_report(&workspace.summarizer(), &workspace.engine(), &workspace.paths.reports)?;
            if json {
                println!("{}", serde_json::json!({ "report": path }));
            } else {
                println!("Report saved to {}", path.display());
            }
            Ok(())
        }
    }
}

/// Create the literature folders and start logging into `logs/`
fn prepare(literature_dir: &Path, verbose: bool) -> anyhow::Result<LiteraturePaths> {
    let paths = LiteraturePaths::new(literature_dir);
    paths
        .ensure_folders_exist()
        .with_context(|| format!("Failed to prepare {}", paths.root.display()))?;

    if let Some(log_path) = logging::init_logging(&paths.logs, verbose) {
        tracing::debug!("Logging to {}", log_path.display());
    }
    Ok(paths)
}

fn handle_clear(paths: &LiteraturePaths, target: CacheTarget) -> anyhow::Result<()> {
    let folder = paths.cache_dir(target);
    let removed = ContentCache::new(folder).clear()?;
    tracing::info!("Cleared {} {} files in {}", removed, target.as_str(), folder.display());
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        let papers: Vec<serde_json::Value> = outcome
            .classified
            .iter()
            .map(|c| serde_json::json!({ "source": c.source, "title": c.title, "category": c.category.as_str() }))
            .collect();
        let failures: Vec<serde_json::Value> = outcome
            .failures
            .iter()
            .map(|f| serde_json::json!({ "source": f.source, "error": f.error.to_string() }))
            .collect();
        let output = serde_json::json!({ "papers": papers, "failures": failures });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for paper in &outcome.classified {
        println!("Paper: {}\nCategory: {}\n", paper.title, paper.category);
    }
    if !outcome.failures.is_empty() {
        println!("Failed ({}):", outcome.failures.len());
        for failure in &outcome.failures {
            println!("  - {}: {}", failure.source, failure.error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_accepts_full_pipeline_alias() {
        let cli = Cli::try_parse_from(["litreview", "full-pipeline"]).expect("should parse alias");
        assert!(matches!(cli.command, Commands::Run));
        assert_eq!(cli.literature_dir, PathBuf::from("./literature"));
    }

    #[test]
    fn test_clear_targets() {
        let cli = Cli::try_parse_from(["litreview", "clear", "conditions"]).expect("should parse clear");
        match cli.command {
            Commands::Clear { target } => assert_eq!(CacheTarget::from(target), CacheTarget::Conditions),
            _ => panic!("expected Clear"),
        }

        let result = Cli::try_parse_from(["litreview", "clear", "reports"]);
        assert!(result.is_err(), "only parsed and conditions can be cleared");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "litreview", "list", "--json", "--literature-dir", "/data/lit", "--model", "gpt-4o-mini",
        ])
        .expect("should parse global flags");
        assert!(matches!(cli.command, Commands::List));
        assert!(cli.json);
        assert_eq!(cli.literature_dir, PathBuf::from("/data/lit"));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_missing_command_fails() {
        assert!(Cli::try_parse_from(["litreview"]).is_err());
    }

    #[test]
    fn test_missing_api_key_client_is_fatal() {
        let request = StructuredRequest {
            system_prompt: "s",
            user_message: "u",
            schema_name: "ConditionResult".to_string(),
            schema: serde_json::json!({}),
        };
        let err = MissingApiKey.complete(&request).unwrap_err();
        assert!(!err.is_item_level());
    }

    #[test]
    fn test_clear_removes_cached_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LiteraturePaths::new(dir.path());
        paths.ensure_folders_exist().unwrap();
        std::fs::write(paths.parsed.join("abc.json"), "{}").unwrap();
        std::fs::write(paths.conditions.join("def.json"), "{}").unwrap();

        handle_clear(&paths, CacheTarget::Parsed).unwrap();
        assert_eq!(std::fs::read_dir(&paths.parsed).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&paths.conditions).unwrap().count(), 1);
    }

    #[test]
    fn test_completions_need_no_literature_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("literature");
        let cli = Cli::try_parse_from(["litreview", "completions", "bash", "--literature-dir", root.to_str().unwrap()])
            .expect("should parse completions");

        run_cli(cli).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_prepare_creates_output_folders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = prepare(&dir.path().join("literature"), false).unwrap();
        assert!(paths.parsed.is_dir());
        assert!(paths.logs.is_dir());
    }

    #[test]
    fn test_verify_cli() {
        Cli::command().debug_assert();
    }
}
