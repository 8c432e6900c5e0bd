//! Panelgrade - multi-agent proposal review CLI
//!
//! The `panelgrade` command grades proposal bundles against weighted
//! scoring rubrics.
//!
//! ## Commands
//!
//! - `rubric`: Build a rubric snapshot (and prompt templates) from CSV tables
//! - `grade`: Score one bundle per-criterion with the panel scorer
//! - `review`: Run the full multi-agent review panel
//! - `agents`: List the built-in reviewer personas

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use panelgrade_core::{
    aggregate, compliance, init_tracing, load_bundle, render_report, save_action_items,
    save_agent_feedback, save_scorecard_json, save_summary, validate_bundle_dir, CritiqueAgent,
    CsvAuditSink, DocumentBundle, HttpOracle, PanelScorerAgent, PlainTextReader, ReviewAgent,
    ReviewConfig, ReviewCoordinator, ReviewInput, ScoreScheduler, ScoreSink, ScoringOracle,
};
use panelgrade_rubric::{
    flatten, parse_criteria_table, parse_rubric_table, snapshot, template_map, RubricBuilder,
    ScoringUnit,
};

#[derive(Parser)]
#[command(name = "panelgrade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-agent proposal review and grading", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to a TOML run configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a rubric snapshot from criteria and rubric CSV tables
    Rubric {
        /// Path to the evaluation rubric CSV
        #[arg(long)]
        rubric: PathBuf,

        /// Path to the criteria-description CSV
        #[arg(long)]
        criteria: Option<PathBuf>,

        /// Output path for the rubric snapshot JSON
        #[arg(short, long, default_value = "output/complete_rubric.json")]
        output: PathBuf,

        /// Directory to write per-criterion prompt templates into
        #[arg(long)]
        prompts_dir: Option<PathBuf>,
    },

    /// Score a proposal bundle per-criterion with the panel scorer
    Grade {
        /// Directory containing the proposal bundle
        #[arg(long, default_value = "documents/proposal")]
        bundle: PathBuf,

        /// Path to the rubric snapshot JSON
        #[arg(long, default_value = "output/complete_rubric.json")]
        rubric: PathBuf,

        /// Main proposal file name within the bundle
        #[arg(long, default_value = "tech_proposal.md")]
        proposal: String,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Oracle API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// Run the multi-agent review panel over a proposal bundle
    Review {
        /// Directory containing the proposal bundle
        #[arg(long, default_value = "documents/proposal")]
        bundle: PathBuf,

        /// Path to the rubric snapshot JSON
        #[arg(long, default_value = "output/complete_rubric.json")]
        rubric: PathBuf,

        /// Main proposal file name within the bundle
        #[arg(long, default_value = "tech_proposal.md")]
        proposal: String,

        /// Comma-separated agent ids (defaults to the configured panel)
        #[arg(long)]
        agents: Option<String>,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Oracle API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// List the built-in reviewer personas
    Agents,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Rubric {
            rubric,
            criteria,
            output,
            prompts_dir,
        } => cmd_rubric(&rubric, criteria.as_deref(), &output, prompts_dir.as_deref()).await,
        Commands::Grade {
            bundle,
            rubric,
            proposal,
            output,
            api_key,
        } => cmd_grade(config, &bundle, &rubric, &proposal, &output, api_key).await,
        Commands::Review {
            bundle,
            rubric,
            proposal,
            agents,
            output,
            api_key,
        } => {
            cmd_review(
                config,
                &bundle,
                &rubric,
                &proposal,
                agents.as_deref(),
                &output,
                api_key,
            )
            .await
        }
        Commands::Agents => cmd_agents(),
    }
}

fn load_config(path: Option<&Path>) -> Result<ReviewConfig> {
    match path {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&body)
                .with_context(|| format!("Failed to parse config {}", path.display()))
        }
        None => Ok(ReviewConfig::default()),
    }
}

async fn cmd_rubric(
    rubric_csv: &Path,
    criteria_csv: Option<&Path>,
    output: &Path,
    prompts_dir: Option<&Path>,
) -> Result<()> {
    let rubric_text = tokio::fs::read_to_string(rubric_csv)
        .await
        .with_context(|| format!("Failed to read rubric table {}", rubric_csv.display()))?;
    let rows = parse_rubric_table(&rubric_text).context("Failed to parse rubric table")?;

    let builder = match criteria_csv {
        Some(path) => {
            let criteria_text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read criteria table {}", path.display()))?;
            let criteria =
                parse_criteria_table(&criteria_text).context("Failed to parse criteria table")?;
            RubricBuilder::with_criteria(criteria)
        }
        None => RubricBuilder::new(),
    };

    let rubric = builder.build(&rows);
    let units = flatten(&rubric).context("Rubric flattening failed")?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, snapshot::to_json_string(&rubric)?).await?;
    println!("Saved rubric snapshot: {}", output.display());
    println!("  types: {}", rubric.types.len());
    println!("  scoring units: {}", units.len());

    if let Some(dir) = prompts_dir {
        tokio::fs::create_dir_all(dir).await?;
        let templates = template_map(&units);
        let count = templates.len();
        for (code, template) in templates {
            let path = dir.join(format!("{}.md", code.to_lowercase()));
            tokio::fs::write(&path, template).await?;
        }
        println!("Saved {count} prompt templates to {}", dir.display());
    }

    Ok(())
}

async fn cmd_grade(
    config: ReviewConfig,
    bundle_dir: &Path,
    rubric_path: &Path,
    proposal_name: &str,
    output_dir: &Path,
    api_key: String,
) -> Result<()> {
    let (bundle, units) =
        prepare_run(&config, bundle_dir, rubric_path, proposal_name).await?;
    tokio::fs::create_dir_all(output_dir).await?;

    let oracle = build_oracle(&config, api_key);
    let audit_path = output_dir.join("audit.csv");
    let sink = Arc::new(CsvAuditSink::create(&audit_path).await?);

    let scheduler = ScoreScheduler::new(oracle, config.scheduler.clone());
    let results = scheduler
        .run(&units, &bundle, Some(sink.clone() as Arc<dyn ScoreSink>))
        .await;
    let card = aggregate(&results);
    sink.finish(&card).await?;

    let results_path = output_dir.join("results.json");
    tokio::fs::write(
        &results_path,
        serde_json::to_string_pretty(&serde_json::json!({
            "scorecard": card,
            "units": results,
        }))?,
    )
    .await?;

    let report_path = output_dir.join("evaluation_report.md");
    tokio::fs::write(&report_path, render_report(&card, &results)).await?;

    println!("Results saved to {}", results_path.display());
    println!("Audit trail: {}", audit_path.display());
    println!("Report: {}", report_path.display());
    println!("Overall score: {:.2}/4 ({})", card.overall, card.label);
    Ok(())
}

async fn cmd_review(
    config: ReviewConfig,
    bundle_dir: &Path,
    rubric_path: &Path,
    proposal_name: &str,
    agent_override: Option<&str>,
    output_dir: &Path,
    api_key: String,
) -> Result<()> {
    let (bundle, units) =
        prepare_run(&config, bundle_dir, rubric_path, proposal_name).await?;
    tokio::fs::create_dir_all(output_dir).await?;

    let agent_ids: Vec<String> = match agent_override {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => config.agents.clone(),
    };
    let profiles = panelgrade_core::resolve_profiles(&agent_ids)?;
    let oracle = build_oracle(&config, api_key);

    let audit_path = output_dir.join("audit.csv");
    let sink: Arc<dyn ScoreSink> = Arc::new(CsvAuditSink::create(&audit_path).await?);

    let mut agents: Vec<Arc<dyn ReviewAgent>> = Vec::new();
    for profile in profiles {
        if profile.id == "panel_scorer" {
            agents.push(Arc::new(PanelScorerAgent::new(
                &profile.id,
                ScoreScheduler::new(Arc::clone(&oracle), config.scheduler.clone()),
                Some(Arc::clone(&sink)),
            )));
        } else {
            agents.push(Arc::new(CritiqueAgent::new(profile, Arc::clone(&oracle))));
        }
    }

    let coordinator = ReviewCoordinator::new(agents, config.coordinator.clone());
    let state = coordinator
        .run(ReviewInput {
            bundle: Arc::new(bundle),
            units: Arc::new(units),
            solicitation_text: String::new(),
        })
        .await?;

    for output in state.outputs.values() {
        save_agent_feedback(output, output_dir).await?;
    }
    save_scorecard_json(&state.consolidated_scores, output_dir).await?;
    save_summary(&state.summary, output_dir).await?;
    save_action_items(&state.action_items, output_dir).await?;

    println!("Multi-agent review complete");
    println!("  run id: {}", state.run_id);
    println!("  output directory: {}", output_dir.display());
    println!("  agents: {}", agent_ids.join(", "));
    let failed = state.failed_agents();
    if !failed.is_empty() {
        println!("  failed agents: {}", failed.join(", "));
    }
    Ok(())
}

fn cmd_agents() -> Result<()> {
    println!("Available reviewer personas:");
    for profile in panelgrade_core::builtin_profiles() {
        println!("  {:<20} {:<20} {}", profile.id, profile.name, profile.focus);
    }
    Ok(())
}

/// Validate the bundle, load its documents, and flatten the rubric.
///
/// Everything that can reject a run happens here, before the first oracle
/// call.
async fn prepare_run(
    config: &ReviewConfig,
    bundle_dir: &Path,
    rubric_path: &Path,
    proposal_name: &str,
) -> Result<(DocumentBundle, Vec<ScoringUnit>)> {
    validate_bundle_dir(bundle_dir, &config.required_documents)
        .context("Bundle validation failed")?;

    let mut entries = tokio::fs::read_dir(bundle_dir).await?;
    let mut supporting_paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_text = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("txt")
        );
        if is_text && path.file_name().and_then(|n| n.to_str()) != Some(proposal_name) {
            supporting_paths.push(path);
        }
    }
    supporting_paths.sort();

    let bundle = load_bundle(
        &PlainTextReader,
        &bundle_dir.join(proposal_name),
        &supporting_paths,
    )
    .await
    .context("Failed to load proposal bundle")?;

    let verdict = compliance::check(&bundle.proposal, None, &config.limits);
    if !verdict.passed {
        for violation in &verdict.violations {
            tracing::warn!(%violation, "compliance violation");
        }
    }

    let snapshot_text = tokio::fs::read_to_string(rubric_path)
        .await
        .with_context(|| format!("Failed to read rubric snapshot {}", rubric_path.display()))?;
    let rubric = snapshot::from_json_str(&snapshot_text).context("Invalid rubric snapshot")?;
    let units = flatten(&rubric).context("Rubric flattening failed")?;
    info!(units = units.len(), "prepared review run");

    Ok((bundle, units))
}

fn build_oracle(config: &ReviewConfig, api_key: String) -> Arc<dyn ScoringOracle> {
    let mut oracle_config = config.oracle.clone();
    if !api_key.is_empty() {
        oracle_config.api_key = api_key;
    }
    Arc::new(HttpOracle::new(oracle_config))
}
