//! Builds the weighted rubric tree from flat rubric rows.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::rows::{CriteriaTable, RubricRow};
use crate::tree::{CategoryNode, Rubric, RubricMetadata, SubCategoryNode, TypeNode};

/// Assembles a [`Rubric`] from rubric rows and a criteria-description table.
///
/// The build runs in two passes. The first pass counts distinct
/// sub-categories per `(type, category)` so duplicate rows collapse before
/// the weight split. The second pass attaches nodes in source order: each
/// leaf receives `category_weight / n` where `n` is the distinct
/// sub-category count for its category, and its description comes from an
/// exact triple match against the criteria table (empty if absent).
///
/// Rows that disagree on a category's weight let the last-seen value win;
/// the input is assumed consistent and the builder does not arbitrate.
pub struct RubricBuilder {
    criteria: CriteriaTable,
    metadata: RubricMetadata,
}

impl RubricBuilder {
    /// Builder with no criteria descriptions; leaves get empty descriptions.
    pub fn new() -> Self {
        Self {
            criteria: CriteriaTable::new(),
            metadata: RubricMetadata::default(),
        }
    }

    /// Builder that resolves leaf descriptions from `criteria`.
    pub fn with_criteria(criteria: CriteriaTable) -> Self {
        Self {
            criteria,
            metadata: RubricMetadata::default(),
        }
    }

    /// Override the rubric metadata block.
    pub fn metadata(mut self, metadata: RubricMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the tree. Parse failures belong to the row layer; by the time
    /// rows exist the build itself cannot fail.
    pub fn build(&self, rows: &[RubricRow]) -> Rubric {
        // Pass 1: distinct sub-categories per (type, category).
        let mut subcat_sets: BTreeMap<(&str, &str), BTreeSet<&str>> = BTreeMap::new();
        for row in rows {
            subcat_sets
                .entry((row.type_name.as_str(), row.category.as_str()))
                .or_default()
                .insert(row.sub_category.as_str());
        }

        // Pass 2: attach nodes in source order.
        let mut rubric = Rubric {
            metadata: self.metadata.clone(),
            types: Vec::new(),
        };

        for row in rows {
            let type_idx = match rubric.types.iter().position(|t| t.name == row.type_name) {
                Some(i) => i,
                None => {
                    rubric.types.push(TypeNode {
                        name: row.type_name.clone(),
                        weight: row.type_weight,
                        categories: Vec::new(),
                    });
                    rubric.types.len() - 1
                }
            };
            let type_node = &mut rubric.types[type_idx];

            let cat_idx = match type_node
                .categories
                .iter()
                .position(|c| c.name == row.category)
            {
                Some(i) => i,
                None => {
                    type_node.categories.push(CategoryNode {
                        name: row.category.clone(),
                        weight: row.category_weight,
                        sub_categories: Vec::new(),
                    });
                    type_node.categories.len() - 1
                }
            };
            let category = &mut type_node.categories[cat_idx];
            category.weight = row.category_weight;

            let n_subcats = subcat_sets
                .get(&(row.type_name.as_str(), row.category.as_str()))
                .map(BTreeSet::len)
                .unwrap_or(0);
            let subcat_weight = if n_subcats > 0 {
                row.category_weight / n_subcats as f64
            } else {
                row.category_weight
            };

            let description = self
                .criteria
                .definition(&row.type_name, &row.category, &row.sub_category)
                .unwrap_or_default()
                .to_string();

            let leaf = SubCategoryNode {
                name: row.sub_category.clone(),
                weight: subcat_weight,
                description,
                scoring: row.scoring.clone(),
            };

            // Duplicate sub-category rows collapse to the last-seen leaf.
            match category
                .sub_categories
                .iter()
                .position(|s| s.name == row.sub_category)
            {
                Some(i) => category.sub_categories[i] = leaf,
                None => category.sub_categories.push(leaf),
            }
        }

        debug!(
            types = rubric.types.len(),
            leaves = rubric.leaf_count(),
            "built rubric tree"
        );
        rubric
    }
}

impl Default for RubricBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ScoringLevels;

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
    fn test_equal_split_across_subcategories() {
        let rows = vec![
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
            row("Technical", 70.0, "Risk", 100.0, "Technical"),
        ];
        let rubric = RubricBuilder::new().build(&rows);

        let risk = rubric.type_node("Technical").unwrap().category("Risk").unwrap();
        assert_eq!(risk.sub_categories.len(), 2);
        for leaf in &risk.sub_categories {
            assert!((leaf.weight - 50.0).abs() < 1e-9);
        }
        // Weight-splitting invariant: leaf weights sum back to the category weight.
        let sum: f64 = risk.sub_categories.iter().map(|s| s.weight).sum();
        assert!((sum - risk.weight).abs() < 1e-9);
    }

    #[test]
    fn test_split_invariant_holds_for_various_counts() {
        for n in 1..=7usize {
            let rows: Vec<RubricRow> = (0..n)
                .map(|i| row("Technical", 70.0, "Risk", 60.0, &format!("Sub{i}")))
                .collect();
            let rubric = RubricBuilder::new().build(&rows);
            let risk = rubric.type_node("Technical").unwrap().category("Risk").unwrap();
            assert_eq!(risk.sub_categories.len(), n);
            let sum: f64 = risk.sub_categories.iter().map(|s| s.weight).sum();
            assert!((sum - 60.0).abs() < 1e-9, "n={n} sum={sum}");
        }
    }

    #[test]
    fn test_duplicate_subcategory_rows_collapse() {
        let rows = vec![
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
        ];
        let rubric = RubricBuilder::new().build(&rows);
        let risk = rubric.type_node("Technical").unwrap().category("Risk").unwrap();
        assert_eq!(risk.sub_categories.len(), 1);
        // Single distinct sub-category receives the whole category weight.
        assert!((risk.sub_categories[0].weight - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_last_seen_category_weight_wins() {
        let rows = vec![
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
            row("Technical", 70.0, "Risk", 80.0, "Technical"),
        ];
        let rubric = RubricBuilder::new().build(&rows);
        let risk = rubric.type_node("Technical").unwrap().category("Risk").unwrap();
        assert!((risk.weight - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_descriptions_resolved_by_exact_triple() {
        let mut criteria = CriteriaTable::new();
        criteria.insert("Technical", "Risk", "Schedule", "Schedule realism.");
        let rows = vec![
            row("Technical", 70.0, "Risk", 100.0, "Schedule"),
            row("Technical", 70.0, "Risk", 100.0, "Technical"),
        ];
        let rubric = RubricBuilder::with_criteria(criteria).build(&rows);
        let risk = rubric.type_node("Technical").unwrap().category("Risk").unwrap();
        assert_eq!(
            risk.sub_category("Schedule").unwrap().description,
            "Schedule realism."
        );
        assert_eq!(risk.sub_category("Technical").unwrap().description, "");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let rows = vec![
            row("Technical", 70.0, "Zeta", 50.0, "B"),
            row("Technical", 70.0, "Alpha", 50.0, "A"),
            row("Commercial", 30.0, "Market", 100.0, "Size"),
        ];
        let rubric = RubricBuilder::new().build(&rows);
        assert_eq!(rubric.types[0].name, "Technical");
        assert_eq!(rubric.types[1].name, "Commercial");
        assert_eq!(rubric.types[0].categories[0].name, "Zeta");
        assert_eq!(rubric.types[0].categories[1].name, "Alpha");
    }
}
