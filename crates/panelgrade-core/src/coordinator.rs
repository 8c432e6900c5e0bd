//! Multi-agent review orchestration: fan-out, join barrier, reduction.
//!
//! One task per configured agent runs over the same read-only input. Tasks
//! return values; nothing mutates shared state mid-flight. After every
//! agent's slot is populated (success or structured failure payload), a
//! single-threaded reducer merges outputs into the run state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{AgentOutput, ReviewAgent, ReviewInput};
use crate::error::Result;

/// Coordinator knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Cap on consolidated action items kept for the executive summary.
    pub max_action_items: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_action_items: 10,
        }
    }
}

/// The run-scoped aggregate produced by one review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Per-agent output slots; every configured agent has exactly one.
    pub outputs: BTreeMap<String, AgentOutput>,

    /// Criterion → consolidated score across agents.
    pub consolidated_scores: BTreeMap<String, f64>,

    /// Deduplicated action items in first-seen order, capped.
    pub action_items: Vec<String>,

    /// Rendered consolidated summary.
    pub summary: String,
}

impl ReviewState {
    /// Agents whose slot holds a failure payload.
    pub fn failed_agents(&self) -> Vec<&str> {
        self.outputs
            .values()
            .filter(|o| o.confidence == 0.0 && o.feedback.starts_with("Error:"))
            .map(|o| o.agent_id.as_str())
            .collect()
    }
}

/// Runs the configured agents over one document set and reduces their
/// outputs.
pub struct ReviewCoordinator {
    agents: Vec<Arc<dyn ReviewAgent>>,
    config: CoordinatorConfig,
}

impl ReviewCoordinator {
    pub fn new(agents: Vec<Arc<dyn ReviewAgent>>, config: CoordinatorConfig) -> Self {
        Self { agents, config }
    }

    /// Run the full review.
    ///
    /// Fan-out happens only after the input validates; an unscoreable
    /// bundle fails here, before any oracle spend. Each agent writes only
    /// its own returned value, and the reduction below the join barrier is
    /// the only writer of the run state.
    pub async fn run(&self, input: ReviewInput) -> Result<ReviewState> {
        input.bundle.proposal.ensure_text()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, agents = self.agents.len(), "starting multi-agent review");

        let mut join_set: JoinSet<(String, AgentOutput)> = JoinSet::new();
        for agent in &self.agents {
            let agent = Arc::clone(agent);
            let input = input.clone();
            join_set.spawn(async move {
                let id = agent.id().to_string();
                let output = match agent.review(&input).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(agent = %id, error = %e, "agent review failed");
                        AgentOutput::failure(&id, &e.to_string())
                    }
                };
                (id, output)
            });
        }

        // Join barrier: every agent's slot must be populated, success or
        // failure, before reduction starts.
        let mut outputs: BTreeMap<String, AgentOutput> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, output)) => {
                    outputs.insert(id, output);
                }
                Err(e) => warn!(error = %e, "agent task join error"),
            }
        }
        for agent in &self.agents {
            if !outputs.contains_key(agent.id()) {
                outputs.insert(
                    agent.id().to_string(),
                    AgentOutput::failure(agent.id(), "review task did not complete"),
                );
            }
        }

        let agent_order: Vec<String> = self.agents.iter().map(|a| a.id().to_string()).collect();
        let consolidated_scores = consolidate_scores(&agent_order, &outputs);
        let action_items =
            consolidate_action_items(&agent_order, &outputs, self.config.max_action_items);
        let summary = render_summary(&agent_order, &outputs, &consolidated_scores, &action_items);

        info!(run_id = %run_id, "multi-agent review complete");
        Ok(ReviewState {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outputs,
            consolidated_scores,
            action_items,
            summary,
        })
    }
}

/// Merge per-agent score maps.
///
/// A criterion reported by several agents gets the arithmetic mean of their
/// values, which keeps the merge deterministic and order-independent; the
/// per-agent values stay available in each output slot.
fn consolidate_scores(
    agent_order: &[String],
    outputs: &BTreeMap<String, AgentOutput>,
) -> BTreeMap<String, f64> {
    let mut gathered: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for id in agent_order {
        if let Some(output) = outputs.get(id) {
            for (criterion, score) in &output.scores {
                gathered.entry(criterion.clone()).or_default().push(*score);
            }
        }
    }
    gathered
        .into_iter()
        .map(|(criterion, values)| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (criterion, mean)
        })
        .collect()
}

/// Concatenate action items in agent-config order, dropping exact-text
/// repeats while preserving first-seen order, capped at `max_items`.
fn consolidate_action_items(
    agent_order: &[String],
    outputs: &BTreeMap<String, AgentOutput>,
    max_items: usize,
) -> Vec<String> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut items = Vec::new();
    for id in agent_order {
        if let Some(output) = outputs.get(id) {
            for item in &output.action_items {
                if items.len() >= max_items {
                    return items;
                }
                if seen.insert(item.as_str()) {
                    items.push(item.clone());
                }
            }
        }
    }
    items
}

fn render_summary(
    agent_order: &[String],
    outputs: &BTreeMap<String, AgentOutput>,
    consolidated_scores: &BTreeMap<String, f64>,
    action_items: &[String],
) -> String {
    let mut summary = String::from("# Multi-Agent Review Summary\n\n");

    for id in agent_order {
        let Some(output) = outputs.get(id) else { continue };
        summary.push_str(&format!("## {}\n\n{}\n\n", title_case(id), output.feedback));
        if !output.scores.is_empty() {
            summary.push_str("**Scores:**\n");
            for (criterion, score) in &output.scores {
                summary.push_str(&format!("- {criterion}: {score}\n"));
            }
            summary.push('\n');
        }
    }

    if !consolidated_scores.is_empty() {
        summary.push_str("## Consolidated Scores\n\n");
        for (criterion, score) in consolidated_scores {
            summary.push_str(&format!("- **{criterion}**: {score}\n"));
        }
        summary.push('\n');
    }

    if !action_items.is_empty() {
        summary.push_str("## Action Items\n\n");
        for (i, item) in action_items.iter().enumerate() {
            summary.push_str(&format!("{}. {item}\n", i + 1));
        }
    }

    summary
}

fn title_case(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
