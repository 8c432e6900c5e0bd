//! Error types for rubric parsing, construction, and flattening.

use thiserror::Error;

/// Errors produced by the rubric layer.
#[derive(Debug, Error)]
pub enum RubricError {
    /// A required column is absent from the input table header.
    #[error("missing required column: {column}")]
    MissingColumn { column: String },

    /// A weight field failed to parse as a number.
    #[error("row {row}: invalid {column} value '{value}'")]
    InvalidWeight {
        row: usize,
        column: String,
        value: String,
    },

    /// A data record carries fewer fields than the header.
    #[error("row {row}: expected {expected} fields, got {actual}")]
    FieldCount {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// A quoted field was opened but never closed.
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },

    /// Two rubric leaves flatten to the same identity key.
    #[error("duplicate scoring unit: {key}")]
    DuplicateUnit { key: String },

    /// A rubric snapshot document is not structured as expected.
    #[error("malformed rubric snapshot: {0}")]
    MalformedSnapshot(String),

    /// Bubbled-up serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, RubricError>;
