//! Panelgrade Core - concurrent proposal scoring and multi-agent review
//!
//! The pipeline: documents are extracted (behind [`documents::DocumentReader`]),
//! a flattened rubric fans out one oracle call per scoring unit under the
//! [`scheduler::ScoreScheduler`]'s warm-up/batch/backoff schedule, the
//! [`aggregate`] module reduces raw results deterministically, and the
//! [`coordinator::ReviewCoordinator`] runs the whole thing once per
//! configured reviewer agent and merges the panel's outputs.

pub mod aggregate;
pub mod agents;
pub mod compliance;
pub mod config;
pub mod coordinator;
pub mod documents;
pub mod error;
pub mod http;
pub mod oracle;
pub mod report;
pub mod scheduler;
pub mod telemetry;

// Re-export key types
pub use aggregate::{aggregate, Scorecard, ScoreLabel, SectionScore};
pub use agents::{
    builtin_profiles, resolve_profiles, AgentOutput, AgentProfile, CritiqueAgent,
    PanelScorerAgent, ReviewAgent, ReviewInput,
};
pub use compliance::{BudgetSummary, ComplianceLimits, ComplianceVerdict};
pub use config::ReviewConfig;
pub use coordinator::{CoordinatorConfig, ReviewCoordinator, ReviewState};
pub use documents::{
    load_bundle, missing_documents, validate_bundle_dir, DocumentBundle, DocumentReader,
    DocumentSection, ExtractedDocument, PlainTextReader,
};
pub use error::{CoreError, Result};
pub use http::{HttpOracle, HttpOracleConfig};
pub use oracle::{
    extract_json_object, parse_score_response, repair_escapes, OracleError, OracleScore,
    ScoringOracle,
};
pub use report::{
    render_report, save_action_items, save_agent_feedback, save_scorecard_json, save_summary,
    CsvAuditSink,
};
pub use scheduler::{ScoreScheduler, ScoreSink, SchedulerConfig, UnitResult};
pub use telemetry::init_tracing;
