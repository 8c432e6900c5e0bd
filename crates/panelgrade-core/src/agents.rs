//! Reviewer agent personas and their review implementations.
//!
//! An agent is one independently-configured reviewer running over the same
//! document set. Critique agents return prose with scores fished out by
//! pattern matching; the panel scorer is the structured scheduler +
//! aggregator pipeline wearing an agent interface.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::documents::DocumentBundle;
use crate::error::{CoreError, Result};
use crate::oracle::{extract_json_object, ScoringOracle};
use crate::scheduler::{ScoreScheduler, ScoreSink};
use panelgrade_rubric::ScoringUnit;

/// What one agent produced for one review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent_id: String,
    pub feedback: String,
    pub scores: BTreeMap<String, f64>,
    pub action_items: Vec<String>,
    pub confidence: f64,
}

impl AgentOutput {
    /// Structured failure payload: an agent's crash must not block the
    /// others from aggregating.
    pub fn failure(agent_id: &str, reason: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            feedback: format!("Error: {reason}"),
            scores: BTreeMap::new(),
            action_items: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// A reviewer persona: identity plus the system prompt it reviews with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub focus: String,
    pub template: String,
}

/// Built-in reviewer personas.
pub fn builtin_profiles() -> Vec<AgentProfile> {
    let profile = |id: &str, name: &str, focus: &str, template: &str| AgentProfile {
        id: id.to_string(),
        name: name.to_string(),
        focus: focus.to_string(),
        template: template.to_string(),
    };
    vec![
        profile(
            "tech_lead",
            "Tech Lead",
            "Technical feasibility, architecture, and schedule risk",
            "You are a seasoned technical lead reviewing a grant proposal. \
             Judge feasibility, architecture soundness, schedule realism, and \
             technical risk mitigation. Cite concrete evidence from the \
             documents, state an overall score out of 4, and list the changes \
             you would require before funding.",
        ),
        profile(
            "business_strategist",
            "Business Strategist",
            "Market opportunity, commercialization path, and competitive position",
            "You are a business strategist reviewing a grant proposal. Judge \
             market knowledge, commercialization strategy, and competitive \
             positioning. Cite concrete evidence, state an overall score out \
             of 4, and list the actions that would strengthen the commercial \
             case.",
        ),
        profile(
            "detail_checker",
            "Detail Checker",
            "Internal consistency, compliance, and numeric accuracy",
            "You are a meticulous compliance reviewer. Hunt for internal \
             inconsistencies, unsupported claims, and numbers that do not add \
             up across the proposal and its supporting documents. State an \
             overall score out of 4 and list every discrepancy as an action \
             item.",
        ),
        profile(
            "storyteller",
            "Storyteller",
            "Narrative clarity and persuasiveness",
            "You are an editor judging how clearly and persuasively this \
             proposal tells its story to a review panel. State an overall \
             score out of 4 and list the narrative fixes that would most \
             improve it.",
        ),
        profile(
            "panel_scorer",
            "Panel Scorer",
            "Structured per-criterion rubric scoring",
            "",
        ),
    ]
}

/// Resolve agent ids against the built-in registry.
pub fn resolve_profiles(ids: &[String]) -> Result<Vec<AgentProfile>> {
    let registry = builtin_profiles();
    ids.iter()
        .map(|id| {
            registry
                .iter()
                .find(|p| p.id == *id)
                .cloned()
                .ok_or_else(|| CoreError::UnknownAgent(id.clone()))
        })
        .collect()
}

/// Read-only shared state every agent reviews against.
#[derive(Clone)]
pub struct ReviewInput {
    pub bundle: Arc<DocumentBundle>,
    pub units: Arc<Vec<ScoringUnit>>,
    pub solicitation_text: String,
}

impl ReviewInput {
    /// Rendered criteria summary for critique prompts.
    pub fn criteria_summary(&self) -> String {
        let mut out = String::new();
        for unit in self.units.iter() {
            out.push_str(&format!(
                "**{}** (Weight: {:.1}%)\n{}\n\n",
                unit.display_name(),
                unit.weight * 100.0,
                unit.description,
            ));
        }
        out
    }
}

/// One reviewer in the panel.
#[async_trait]
pub trait ReviewAgent: Send + Sync {
    fn id(&self) -> &str;

    /// Review the shared input and return this agent's output. Errors are
    /// the caller's signal to record a failure payload in this agent's
    /// slot; they never abort the panel.
    async fn review(&self, input: &ReviewInput) -> Result<AgentOutput>;
}

/// Free-text reviewer: one oracle call, scores extracted from prose.
pub struct CritiqueAgent {
    profile: AgentProfile,
    oracle: Arc<dyn ScoringOracle>,
}

impl CritiqueAgent {
    pub fn new(profile: AgentProfile, oracle: Arc<dyn ScoringOracle>) -> Self {
        Self { profile, oracle }
    }

    fn build_prompt(&self, input: &ReviewInput) -> String {
        format!(
            "# {name} Review\n\n\
             ## Your Role\n**Focus**: {focus}\n\n{template}\n\n\
             ## Solicitation Context\n{solicitation}\n\n\
             ## Evaluation Criteria\n{criteria}\n\
             ## Main Proposal\n{proposal}\n\n\
             ## Supporting Documents\n{supporting}\n\n\
             Provide a comprehensive review based on your role focus. Be \
             specific, actionable, and cite evidence from the documents.",
            name = self.profile.name,
            focus = self.profile.focus,
            template = self.profile.template,
            solicitation = input.solicitation_text,
            criteria = input.criteria_summary(),
            proposal = input.bundle.proposal.full_text,
            supporting = input.bundle.supporting_text(),
        )
    }
}

#[async_trait]
impl ReviewAgent for CritiqueAgent {
    fn id(&self) -> &str {
        &self.profile.id
    }

    async fn review(&self, input: &ReviewInput) -> Result<AgentOutput> {
        info!(agent = %self.profile.id, "running critique review");
        let prompt = self.build_prompt(input);
        let feedback = self.oracle.complete(&prompt).await?;

        let scores = extract_scores(&self.profile.id, &feedback);
        let action_items = extract_action_items(&feedback);
        debug!(
            agent = %self.profile.id,
            scores = scores.len(),
            action_items = action_items.len(),
            "critique review complete"
        );

        Ok(AgentOutput {
            agent_id: self.profile.id.clone(),
            feedback,
            scores,
            action_items,
            confidence: 0.8,
        })
    }
}

/// Structured reviewer: the concurrent scheduler plus the aggregator.
pub struct PanelScorerAgent {
    id: String,
    scheduler: ScoreScheduler,
    sink: Option<Arc<dyn ScoreSink>>,
}

impl PanelScorerAgent {
    pub fn new(id: &str, scheduler: ScoreScheduler, sink: Option<Arc<dyn ScoreSink>>) -> Self {
        Self {
            id: id.to_string(),
            scheduler,
            sink,
        }
    }
}

#[async_trait]
impl ReviewAgent for PanelScorerAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn review(&self, input: &ReviewInput) -> Result<AgentOutput> {
        info!(agent = %self.id, units = input.units.len(), "running panel scoring");
        let results = self
            .scheduler
            .run(&input.units, &input.bundle, self.sink.clone())
            .await;
        let card = aggregate(&results);

        let mut scores = BTreeMap::new();
        for result in &results {
            if let Some(score) = result.score {
                scores.insert(result.unit.display_name(), score);
            }
        }

        let mut feedback = format!(
            "Overall score: {:.2}/4 ({})\n",
            card.overall, card.label
        );
        for section in &card.sections {
            feedback.push_str(&format!(
                "- {}: {:.2} ({} of its criteria scored)\n",
                section.section, section.score, section.scored_units
            ));
        }
        for result in &results {
            if result.score.is_none() {
                feedback.push_str(&format!(
                    "- could not score: {}\n",
                    result.unit.display_name()
                ));
            }
        }

        let confidence = if results.is_empty() {
            0.0
        } else {
            card.scored_units as f64 / results.len() as f64
        };

        Ok(AgentOutput {
            agent_id: self.id.clone(),
            feedback,
            scores,
            action_items: Vec::new(),
            confidence,
        })
    }
}

/// Extract a criterion → score map from free-text feedback.
///
/// A structured JSON object wins if the agent happened to emit one; failing
/// that, the first prose pattern (`3.5/4`, `score ... 3.5`, `3.5 out of 4`)
/// supplies a single overall score keyed `{agent_id}_score`. Matches are
/// rounded to the nearest 0.5 and dropped when outside the 1-4 scale.
pub fn extract_scores(agent_id: &str, feedback: &str) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();

    if let Some(candidate) = extract_json_object(feedback) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if let Some(object) = value.as_object() {
                for (criterion, entry) in object {
                    if let Some(score) = entry.get("score").and_then(serde_json::Value::as_f64) {
                        if (1.0..=4.0).contains(&score) {
                            scores.insert(criterion.clone(), score);
                        }
                    }
                }
                if !scores.is_empty() {
                    return scores;
                }
            }
        }
    }

    let lowered = feedback.to_lowercase();
    let patterns = [
        r"(\d+\.?\d*)/4",
        r"score\D*?(\d+\.?\d*)",
        r"(\d+\.?\d*)\s*out\s*of\s*4",
    ];
    for pattern in patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(&lowered) {
                if let Some(parsed) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                    let snapped = (parsed * 2.0).round() / 2.0;
                    if (1.0..=4.0).contains(&snapped) {
                        scores.insert(format!("{agent_id}_score"), snapped);
                        break;
                    }
                }
            }
        }
    }
    scores
}

/// Extract bulleted or numbered lines as action items.
pub fn extract_action_items(feedback: &str) -> Vec<String> {
    let mut items = Vec::new();
    for line in feedback.lines() {
        let line = line.trim();
        let is_bullet = line.starts_with(['•', '-', '*'])
            || line
                .chars()
                .next()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);
        if !is_bullet {
            continue;
        }
        let cleaned = line
            .trim_start_matches(['•', '-', '*', ' ', '.', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9'])
            .trim();
        if cleaned.len() > 10 {
            items.push(cleaned.to_string());
        }
    }
    items
}
