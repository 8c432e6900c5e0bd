//! Weighted rubric tree: evaluation types, categories, and sub-categories.

use serde::{Deserialize, Serialize};

/// The four scoring-level definitions attached to each rubric leaf.
///
/// Each field describes what a proposal must look like to earn the
/// corresponding score on the 1-4 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringLevels {
    /// Score 1.
    pub unsatisfactory: String,

    /// Score 2.
    pub marginal: String,

    /// Score 3.
    pub satisfactory: String,

    /// Score 4.
    pub superior: String,
}

/// Metadata carried at the rubric root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricMetadata {
    /// Rubric format version.
    pub version: String,

    /// Human-readable description of the solicitation this rubric grades.
    pub description: String,

    /// Expected sum of type weights (percentages).
    pub total_weight: f64,
}

impl Default for RubricMetadata {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            description: String::new(),
            total_weight: 100.0,
        }
    }
}

/// A rubric leaf: one sub-category carrying its resolved weight share.
///
/// `weight` is a 0-100 percentage of the parent category, assigned by the
/// builder's equal-split rule unless the source data overrides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCategoryNode {
    pub name: String,
    pub weight: f64,
    pub description: String,
    pub scoring: ScoringLevels,
}

/// A category grouping one or more sub-categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub name: String,

    /// 0-100 percentage of the parent type.
    pub weight: f64,

    /// Leaves in source insertion order.
    pub sub_categories: Vec<SubCategoryNode>,
}

impl CategoryNode {
    /// Look up a sub-category by name.
    pub fn sub_category(&self, name: &str) -> Option<&SubCategoryNode> {
        self.sub_categories.iter().find(|s| s.name == name)
    }
}

/// A top-level evaluation type (e.g. `"Technical"`, `"Commercial"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeNode {
    pub name: String,

    /// 0-100 percentage of the whole evaluation.
    pub weight: f64,

    /// Categories in source insertion order.
    pub categories: Vec<CategoryNode>,
}

impl TypeNode {
    /// Look up a category by name.
    pub fn category(&self, name: &str) -> Option<&CategoryNode> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// The weighted rubric tree.
///
/// Children are stored as vectors so traversal order matches the order the
/// source rows introduced each node. Type weights are expected to sum to 100
/// but drift is tolerated here; it surfaces during aggregation instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub metadata: RubricMetadata,
    pub types: Vec<TypeNode>,
}

impl Rubric {
    /// Create an empty rubric with default metadata.
    pub fn new() -> Self {
        Self {
            metadata: RubricMetadata::default(),
            types: Vec::new(),
        }
    }

    /// Look up a type node by name.
    pub fn type_node(&self, name: &str) -> Option<&TypeNode> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Total number of leaves across all types and categories.
    pub fn leaf_count(&self) -> usize {
        self.types
            .iter()
            .flat_map(|t| &t.categories)
            .map(|c| c.sub_categories.len())
            .sum()
    }

    /// Sum of type weights (percentages). Should be near 100.
    pub fn type_weight_sum(&self) -> f64 {
        self.types.iter().map(|t| t.weight).sum()
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, weight: f64) -> SubCategoryNode {
        SubCategoryNode {
            name: name.to_string(),
            weight,
            description: String::new(),
            scoring: ScoringLevels::default(),
        }
    }

    #[test]
    fn test_leaf_count_spans_types_and_categories() {
        let rubric = Rubric {
            metadata: RubricMetadata::default(),
            types: vec![
                TypeNode {
                    name: "Technical".to_string(),
                    weight: 70.0,
                    categories: vec![CategoryNode {
                        name: "Risk".to_string(),
                        weight: 100.0,
                        sub_categories: vec![leaf("Schedule", 50.0), leaf("Technical", 50.0)],
                    }],
                },
                TypeNode {
                    name: "Commercial".to_string(),
                    weight: 30.0,
                    categories: vec![CategoryNode {
                        name: "Market".to_string(),
                        weight: 100.0,
                        sub_categories: vec![leaf("Size", 100.0)],
                    }],
                },
            ],
        };

        assert_eq!(rubric.leaf_count(), 3);
        assert!((rubric.type_weight_sum() - 100.0).abs() < 1e-9);
        assert!(rubric.type_node("Technical").is_some());
        assert!(rubric.type_node("Management").is_none());
    }

    #[test]
    fn test_lookup_preserves_names() {
        let cat = CategoryNode {
            name: "Risk".to_string(),
            weight: 40.0,
            sub_categories: vec![leaf("Schedule", 20.0)],
        };
        assert_eq!(cat.sub_category("Schedule").unwrap().weight, 20.0);
        assert!(cat.sub_category("schedule").is_none());
    }
}
