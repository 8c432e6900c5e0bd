//! Flattens the rubric tree into dispatchable scoring units.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RubricError};
use crate::tree::{Rubric, ScoringLevels};

/// Root key reserved for snapshot metadata; never a real evaluation type.
pub const METADATA_KEY: &str = "metadata";

/// One rubric leaf flattened for dispatch to the scoring oracle.
///
/// `weight` is this leaf's share of its section as a 0-1 fraction;
/// `type_weight` stays a 0-100 percentage so the aggregator can weight
/// sections against each other the same way the source tables express it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringUnit {
    pub type_name: String,
    pub type_weight: f64,
    pub category: String,
    pub sub_category: String,
    pub description: String,
    pub scoring: ScoringLevels,
    pub weight: f64,
}

impl ScoringUnit {
    /// Identity key, unique within one rubric snapshot.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.type_name, self.category, self.sub_category)
    }

    /// Scoring-template code: `CATEGORY_SUBCATEGORY`, upper-cased with
    /// spaces and slashes mapped to underscores.
    pub fn code(&self) -> String {
        format!(
            "{}_{}",
            sanitize_code(&self.category),
            sanitize_code(&self.sub_category)
        )
    }

    /// Display name, e.g. `"Risk - Schedule"`.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.category, self.sub_category)
    }
}

fn sanitize_code(part: &str) -> String {
    part.to_uppercase().replace([' ', '/'], "_")
}

/// Walk the tree into a flat unit list in stable traversal order
/// (types, then categories, then sub-categories, all in insertion order).
///
/// Leaf weights are converted from 0-100 percentages to 0-1 fractions here
/// so downstream arithmetic is unit-consistent. A type node named
/// `"metadata"` is skipped; it is the snapshot's reserved pseudo-type.
pub fn flatten(rubric: &Rubric) -> Result<Vec<ScoringUnit>> {
    let mut units = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for type_node in &rubric.types {
        if type_node.name == METADATA_KEY {
            continue;
        }
        for category in &type_node.categories {
            for leaf in &category.sub_categories {
                let unit = ScoringUnit {
                    type_name: type_node.name.clone(),
                    type_weight: type_node.weight,
                    category: category.name.clone(),
                    sub_category: leaf.name.clone(),
                    description: leaf.description.clone(),
                    scoring: leaf.scoring.clone(),
                    weight: leaf.weight / 100.0,
                };
                if !seen.insert(unit.key()) {
                    return Err(RubricError::DuplicateUnit { key: unit.key() });
                }
                units.push(unit);
            }
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RubricBuilder;
    use crate::rows::RubricRow;
    use crate::tree::{CategoryNode, SubCategoryNode, TypeNode};

    fn row(type_name: &str, tw: f64, category: &str, cw: f64, sub: &str) -> RubricRow {
        RubricRow {
            type_name: type_name.to_string(),
            type_weight: tw,
            category: category.to_string(),
            category_weight: cw,
            sub_category: sub.to_string(),
            scoring: ScoringLevels::default(),
        }
    }

    #[test]
    fn test_flatten_produces_one_unit_per_leaf() {
        let rows = vec![
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
            row("Technical", 70.0, "Risk", 100.0, "Technical"),
            row("Commercial", 30.0, "Market", 100.0, "Size"),
        ];
        let rubric = RubricBuilder::new().build(&rows);
        let units = flatten(&rubric).unwrap();

        assert_eq!(units.len(), rubric.leaf_count());
        assert_eq!(units[0].key(), "Technical|Risk|Schedule");
        assert_eq!(units[2].type_name, "Commercial");
    }

    #[test]
    fn test_flatten_converts_percentage_to_fraction() {
        let rows = vec![
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
            row("Technical", 70.0, "Risk", 100.0, "Technical"),
        ];
        let rubric = RubricBuilder::new().build(&rows);
        let units = flatten(&rubric).unwrap();

        // 100% category split over two leaves: 50% each, 0.5 as a fraction.
        for unit in &units {
            assert!((unit.weight - 0.5).abs() < 1e-9);
            assert!((unit.type_weight - 70.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_flatten_rejects_duplicate_identity() {
        let rubric = Rubric {
            metadata: Default::default(),
            types: vec![TypeNode {
                name: "Technical".to_string(),
                weight: 70.0,
                categories: vec![CategoryNode {
                    name: "Risk".to_string(),
                    weight: 100.0,
                    sub_categories: vec![
                        SubCategoryNode {
                            name: "Schedule".to_string(),
                            weight: 50.0,
                            description: String::new(),
                            scoring: ScoringLevels::default(),
                        },
                        SubCategoryNode {
                            name: "Schedule".to_string(),
                            weight: 50.0,
                            description: String::new(),
                            scoring: ScoringLevels::default(),
                        },
                    ],
                }],
            }],
        };
        let err = flatten(&rubric).unwrap_err();
        assert!(matches!(err, RubricError::DuplicateUnit { .. }));
    }

    #[test]
    fn test_flatten_skips_metadata_pseudo_type() {
        let rubric = Rubric {
            metadata: Default::default(),
            types: vec![
                TypeNode {
                    name: METADATA_KEY.to_string(),
                    weight: 0.0,
                    categories: Vec::new(),
                },
                TypeNode {
                    name: "Technical".to_string(),
                    weight: 100.0,
                    categories: vec![CategoryNode {
                        name: "Risk".to_string(),
                        weight: 100.0,
                        sub_categories: vec![SubCategoryNode {
                            name: "Schedule".to_string(),
                            weight: 100.0,
                            description: String::new(),
                            scoring: ScoringLevels::default(),
                        }],
                    }],
                },
            ],
        };
        let units = flatten(&rubric).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].type_name, "Technical");
    }

    #[test]
    fn test_code_sanitizes_spaces_and_slashes() {
        let unit = ScoringUnit {
            type_name: "Commercial".to_string(),
            type_weight: 30.0,
            category: "Market Knowledge".to_string(),
            sub_category: "Go/No-Go".to_string(),
            description: String::new(),
            scoring: ScoringLevels::default(),
            weight: 1.0,
        };
        assert_eq!(unit.code(), "MARKET_KNOWLEDGE_GO_NO-GO");
    }
}
