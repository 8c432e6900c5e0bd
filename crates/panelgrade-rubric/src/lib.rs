//! Panelgrade Rubric - weighted evaluation rubrics
//!
//! Turns flat criteria/weight tables into a three-level weighted tree
//! (types → categories → sub-categories), flattens the tree back into
//! dispatchable scoring units, and handles the keyed-JSON snapshot format
//! and per-criterion prompt templates.

pub mod builder;
pub mod error;
pub mod flatten;
pub mod rows;
pub mod snapshot;
pub mod template;
pub mod tree;

// Re-export key types
pub use builder::RubricBuilder;
pub use error::{Result, RubricError};
pub use flatten::{flatten, ScoringUnit, METADATA_KEY};
pub use rows::{parse_criteria_table, parse_rubric_table, CriteriaTable, RubricRow};
pub use template::{render, template_map, unit_template, SECTION_TEXT_VAR};
pub use tree::{CategoryNode, Rubric, RubricMetadata, ScoringLevels, SubCategoryNode, TypeNode};
