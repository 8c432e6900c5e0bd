//! Keyed-JSON rubric snapshots.
//!
//! The persisted form nests name-keyed objects (`types` → `categories` →
//! `sub_categories`) with 0-100 percentage weights, interoperable with
//! rubric files produced by earlier tooling. The in-memory [`Rubric`] keeps
//! vectors instead so traversal order stays tied to the source data.

use serde_json::{json, Map, Value};

use crate::error::{Result, RubricError};
use crate::flatten::METADATA_KEY;
use crate::tree::{CategoryNode, Rubric, RubricMetadata, ScoringLevels, SubCategoryNode, TypeNode};

/// Serialize a rubric to the keyed snapshot value.
pub fn to_value(rubric: &Rubric) -> Value {
    let mut types = Map::new();
    for type_node in &rubric.types {
        let mut categories = Map::new();
        for category in &type_node.categories {
            let mut subs = Map::new();
            for leaf in &category.sub_categories {
                subs.insert(
                    leaf.name.clone(),
                    json!({
                        "description": leaf.description,
                        "scoring": {
                            "unsatisfactory": leaf.scoring.unsatisfactory,
                            "marginal": leaf.scoring.marginal,
                            "satisfactory": leaf.scoring.satisfactory,
                            "superior": leaf.scoring.superior,
                        },
                        "weight": leaf.weight,
                    }),
                );
            }
            categories.insert(
                category.name.clone(),
                json!({ "weight": category.weight, "sub_categories": subs }),
            );
        }
        types.insert(
            type_node.name.clone(),
            json!({ "weight": type_node.weight, "categories": categories }),
        );
    }

    json!({
        "metadata": {
            "version": rubric.metadata.version,
            "description": rubric.metadata.description,
            "total_weight": rubric.metadata.total_weight,
        },
        "types": types,
    })
}

/// Serialize a rubric to pretty-printed snapshot JSON.
pub fn to_json_string(rubric: &Rubric) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_value(rubric))?)
}

/// Reconstruct a rubric from a keyed snapshot value.
///
/// A `"metadata"` entry inside the `types` map (produced by tooling that
/// flattened the root) is tolerated and skipped.
pub fn from_value(value: &Value) -> Result<Rubric> {
    let root = value
        .as_object()
        .ok_or_else(|| malformed("root is not an object"))?;

    let metadata = match root.get(METADATA_KEY) {
        Some(meta) => RubricMetadata {
            version: str_field(meta, "version").unwrap_or("1.0").to_string(),
            description: str_field(meta, "description").unwrap_or_default().to_string(),
            total_weight: num_field(meta, "total_weight").unwrap_or(100.0),
        },
        None => RubricMetadata::default(),
    };

    let types_map = root
        .get("types")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'types' object"))?;

    let mut types = Vec::new();
    for (type_name, type_value) in types_map {
        if type_name == METADATA_KEY {
            continue;
        }
        let weight = num_field(type_value, "weight")
            .ok_or_else(|| malformed(&format!("type '{type_name}' missing numeric weight")))?;
        let categories_map = type_value
            .get("categories")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed(&format!("type '{type_name}' missing 'categories'")))?;

        let mut categories = Vec::new();
        for (category_name, category_value) in categories_map {
            let cat_weight = num_field(category_value, "weight").ok_or_else(|| {
                malformed(&format!("category '{category_name}' missing numeric weight"))
            })?;
            let subs_map = category_value
                .get("sub_categories")
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    malformed(&format!("category '{category_name}' missing 'sub_categories'"))
                })?;

            let mut sub_categories = Vec::new();
            for (sub_name, sub_value) in subs_map {
                let sub_weight = num_field(sub_value, "weight").ok_or_else(|| {
                    malformed(&format!("sub-category '{sub_name}' missing numeric weight"))
                })?;
                let scoring = sub_value.get("scoring").map(parse_scoring).unwrap_or_default();
                sub_categories.push(SubCategoryNode {
                    name: sub_name.clone(),
                    weight: sub_weight,
                    description: str_field(sub_value, "description")
                        .unwrap_or_default()
                        .to_string(),
                    scoring,
                });
            }
            categories.push(CategoryNode {
                name: category_name.clone(),
                weight: cat_weight,
                sub_categories,
            });
        }
        types.push(TypeNode {
            name: type_name.clone(),
            weight,
            categories,
        });
    }

    Ok(Rubric { metadata, types })
}

/// Parse snapshot JSON text into a rubric.
pub fn from_json_str(text: &str) -> Result<Rubric> {
    let value: Value = serde_json::from_str(text)?;
    from_value(&value)
}

fn parse_scoring(value: &Value) -> ScoringLevels {
    ScoringLevels {
        unsatisfactory: str_field(value, "unsatisfactory").unwrap_or_default().to_string(),
        marginal: str_field(value, "marginal").unwrap_or_default().to_string(),
        satisfactory: str_field(value, "satisfactory").unwrap_or_default().to_string(),
        superior: str_field(value, "superior").unwrap_or_default().to_string(),
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn num_field(value: &Value, field: &str) -> Option<f64> {
    value.get(field).and_then(Value::as_f64)
}

fn malformed(detail: &str) -> RubricError {
    RubricError::MalformedSnapshot(detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RubricBuilder;
    use crate::flatten::flatten;
    use crate::rows::RubricRow;

    fn sample_rubric() -> Rubric {
        let rows = vec![
            RubricRow {
                type_name: "Technical".to_string(),
                type_weight: 70.0,
                category: "Risk".to_string(),
                category_weight: 100.0,
                sub_category: "Schedule".to_string(),
                scoring: ScoringLevels {
                    unsatisfactory: "u".to_string(),
                    marginal: "m".to_string(),
                    satisfactory: "s".to_string(),
                    superior: "x".to_string(),
                },
            },
            RubricRow {
                type_name: "Technical".to_string(),
                type_weight: 70.0,
                category: "Risk".to_string(),
                category_weight: 100.0,
                sub_category: "Technical".to_string(),
                scoring: ScoringLevels::default(),
            },
        ];
        RubricBuilder::new().build(&rows)
    }

    #[test]
    fn test_snapshot_shape_is_name_keyed() {
        let value = to_value(&sample_rubric());
        let schedule = &value["types"]["Technical"]["categories"]["Risk"]["sub_categories"]
            ["Schedule"];
        assert_eq!(schedule["weight"], 50.0);
        assert_eq!(schedule["scoring"]["superior"], "x");
        assert_eq!(value["metadata"]["total_weight"], 100.0);
    }

    #[test]
    fn test_roundtrip_preserves_units() {
        let rubric = sample_rubric();
        let restored = from_json_str(&to_json_string(&rubric).unwrap()).unwrap();

        let mut original_units = flatten(&rubric).unwrap();
        let mut restored_units = flatten(&restored).unwrap();
        original_units.sort_by(|a, b| a.key().cmp(&b.key()));
        restored_units.sort_by(|a, b| a.key().cmp(&b.key()));
        assert_eq!(original_units, restored_units);
    }

    #[test]
    fn test_metadata_pseudo_type_in_types_map_is_skipped() {
        let value = json!({
            "types": {
                "metadata": { "version": "1.0" },
                "Technical": {
                    "weight": 100.0,
                    "categories": {
                        "Risk": {
                            "weight": 100.0,
                            "sub_categories": {
                                "Schedule": { "description": "", "weight": 100.0 }
                            }
                        }
                    }
                }
            }
        });
        let rubric = from_value(&value).unwrap();
        assert_eq!(rubric.types.len(), 1);
        assert_eq!(rubric.types[0].name, "Technical");
    }

    #[test]
    fn test_malformed_snapshot_is_rejected() {
        let err = from_json_str("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, RubricError::MalformedSnapshot(_)));

        let err = from_value(&json!({ "types": { "Technical": { "weight": "heavy" } } }))
            .unwrap_err();
        assert!(matches!(err, RubricError::MalformedSnapshot(_)));
    }
}
