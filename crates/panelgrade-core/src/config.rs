//! Run configuration, passed explicitly into each component.
//!
//! One process can hold several of these at once (tests do), so nothing in
//! the pipeline reads configuration from module-level state.

use serde::{Deserialize, Serialize};

use crate::compliance::ComplianceLimits;
use crate::coordinator::CoordinatorConfig;
use crate::http::HttpOracleConfig;
use crate::scheduler::SchedulerConfig;

/// Top-level configuration for a review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Agent ids to fan out, in priority order.
    pub agents: Vec<String>,

    /// File names that must exist in the bundle directory.
    pub required_documents: Vec<String>,

    pub scheduler: SchedulerConfig,
    pub coordinator: CoordinatorConfig,
    pub limits: ComplianceLimits,
    pub oracle: HttpOracleConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            agents: vec![
                "tech_lead".to_string(),
                "business_strategist".to_string(),
                "detail_checker".to_string(),
                "panel_scorer".to_string(),
                "storyteller".to_string(),
            ],
            required_documents: vec!["tech_proposal.md".to_string()],
            scheduler: SchedulerConfig::default(),
            coordinator: CoordinatorConfig::default(),
            limits: ComplianceLimits::default(),
            oracle: HttpOracleConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_agents_include_panel_scorer() {
        let config = ReviewConfig::default();
        assert!(config.agents.iter().any(|a| a == "panel_scorer"));
    }

    #[test]
    fn test_partial_json_config_fills_defaults() {
        let config: ReviewConfig =
            serde_json::from_str(r#"{ "agents": ["tech_lead"] }"#).unwrap();
        assert_eq!(config.agents, vec!["tech_lead".to_string()]);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.coordinator.max_action_items, 10);
    }
}
