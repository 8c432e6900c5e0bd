//! Error taxonomy for the review pipeline.
//!
//! Input errors are fatal before any oracle call; oracle transients are
//! absorbed by the scheduler's retry policy and never surface here; agent
//! failures are isolated into that agent's output slot by the coordinator.

use thiserror::Error;

use crate::oracle::OracleError;

/// Errors produced by the review pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Required documents are absent from the proposal bundle.
    #[error("missing required documents: {missing:?}")]
    MissingDocuments { missing: Vec<String> },

    /// Document extraction produced no usable text.
    #[error("document '{file_name}' produced no text")]
    EmptyDocument { file_name: String },

    /// A document could not be read or decoded.
    #[error("document error for '{file_name}': {detail}")]
    Document { file_name: String, detail: String },

    /// An agent id has no registered profile.
    #[error("unknown agent profile: {0}")]
    UnknownAgent(String),

    /// An agent's review task failed outright.
    #[error("agent '{agent}' failed: {reason}")]
    AgentFailed { agent: String, reason: String },

    /// An audit sink write failed.
    #[error("audit sink error: {0}")]
    Sink(String),

    /// Bubbled-up rubric error.
    #[error("rubric error: {0}")]
    Rubric(#[from] panelgrade_rubric::RubricError),

    /// Bubbled-up oracle error (only from single-shot callers; the
    /// scheduler converts these into null-score results instead).
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Bubbled-up serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bubbled-up I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, CoreError>;
