//! Per-criterion scoring prompt templates.
//!
//! Each rubric leaf gets one template keyed by its code. Templates carry a
//! `{section_text}` substitution point filled in at dispatch time with the
//! proposal text routed to that criterion's section.

use std::collections::BTreeMap;

use crate::flatten::ScoringUnit;

/// Variable slot for the proposal text.
pub const SECTION_TEXT_VAR: &str = "section_text";

/// Build the scoring prompt template for one unit.
///
/// The template states the criterion identity, its weight, the description,
/// and the four 1-4 scoring-level definitions, then asks for a JSON object
/// with `score`, `evidence`, and `reasoning`.
pub fn unit_template(unit: &ScoringUnit) -> String {
    format!(
        "# {name} Evaluation\n\n\
         **Weight**: {weight:.2}%\n\n\
         **Description**: {description}\n\n\
         **Scoring Criteria (1-4 scale):**\n\n\
         **1 (Unsatisfactory)**: {unsatisfactory}\n\n\
         **2 (Marginal)**: {marginal}\n\n\
         **3 (Satisfactory)**: {satisfactory}\n\n\
         **4 (Superior)**: {superior}\n\n\
         **Instructions**: Evaluate the proposal's {criterion} based on the above criteria.\n\n\
         **Proposal Text**:\n{{section_text}}\n\n\
         **Evaluation**:\n\
         Please provide a JSON response with:\n\
         - \"score\": score from 1 to 4, in 0.5 increments only\n\
         - \"evidence\": specific evidence from the proposal text\n\
         - \"reasoning\": brief explanation of the score based on the scoring criteria\n\
         - \"improvements\": concrete changes that would raise the score\n\n\
         **Response**:",
        name = unit.display_name(),
        weight = unit.weight * 100.0,
        description = unit.description,
        unsatisfactory = unit.scoring.unsatisfactory,
        marginal = unit.scoring.marginal,
        satisfactory = unit.scoring.satisfactory,
        superior = unit.scoring.superior,
        criterion = unit.sub_category.to_lowercase(),
    )
}

/// Build the code → template map for a unit list.
pub fn template_map(units: &[ScoringUnit]) -> BTreeMap<String, String> {
    units
        .iter()
        .map(|u| (u.code(), unit_template(u)))
        .collect()
}

/// Substitute named `{var}` slots in a template.
///
/// Only the provided variable names are replaced; any other braces in the
/// template (JSON examples, say) pass through untouched.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ScoringLevels;

    fn unit() -> ScoringUnit {
        ScoringUnit {
            type_name: "Technical".to_string(),
            type_weight: 70.0,
            category: "Risk".to_string(),
            sub_category: "Schedule".to_string(),
            description: "Schedule realism.".to_string(),
            scoring: ScoringLevels {
                unsatisfactory: "No plan".to_string(),
                marginal: "Weak plan".to_string(),
                satisfactory: "Credible plan".to_string(),
                superior: "Strong plan".to_string(),
            },
            weight: 0.5,
        }
    }

    #[test]
    fn test_template_carries_identity_and_levels() {
        let template = unit_template(&unit());
        assert!(template.contains("Risk - Schedule"));
        assert!(template.contains("50.00%"));
        assert!(template.contains("Schedule realism."));
        assert!(template.contains("**1 (Unsatisfactory)**: No plan"));
        assert!(template.contains("**4 (Superior)**: Strong plan"));
        assert!(template.contains("{section_text}"));
    }

    #[test]
    fn test_template_map_keys_by_code() {
        let map = template_map(&[unit()]);
        assert!(map.contains_key("RISK_SCHEDULE"));
    }

    #[test]
    fn test_render_substitutes_only_known_vars() {
        let rendered = render(
            "Score {section_text} as {\"score\": 3}",
            &[(SECTION_TEXT_VAR, "the proposal")],
        );
        assert_eq!(rendered, "Score the proposal as {\"score\": 3}");
    }

    #[test]
    fn test_rendered_template_embeds_section_text() {
        let template = unit_template(&unit());
        let rendered = render(&template, &[(SECTION_TEXT_VAR, "We will ship in Q3.")]);
        assert!(rendered.contains("We will ship in Q3."));
        assert!(!rendered.contains("{section_text}"));
    }
}
