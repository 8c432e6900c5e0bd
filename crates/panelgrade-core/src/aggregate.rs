//! Deterministic reduction of unit results into section and overall scores.
//!
//! Aggregation is a pure function of the result list: persisted raw results
//! re-aggregate to byte-identical output, which is what makes the audit
//! trail replayable.

use serde::{Deserialize, Serialize};

use crate::scheduler::UnitResult;

/// Adjectival rating bands over the 1-4 scale.
///
/// Bands are exhaustive and non-overlapping, lower bound inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLabel {
    Unsatisfactory,
    Marginal,
    Satisfactory,
    Superior,
}

impl ScoreLabel {
    /// Map a score to its band: `< 2.0`, `[2.0, 3.0)`, `[3.0, 3.5)`, `>= 3.5`.
    pub fn for_score(score: f64) -> Self {
        if score < 2.0 {
            ScoreLabel::Unsatisfactory
        } else if score < 3.0 {
            ScoreLabel::Marginal
        } else if score < 3.5 {
            ScoreLabel::Satisfactory
        } else {
            ScoreLabel::Superior
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreLabel::Unsatisfactory => "unsatisfactory",
            ScoreLabel::Marginal => "marginal",
            ScoreLabel::Satisfactory => "satisfactory",
            ScoreLabel::Superior => "superior",
        }
    }
}

impl std::fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted score for one section (= rubric type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    /// Section name (the rubric type).
    pub section: String,

    /// The section's 0-100 weight against other sections.
    pub type_weight: f64,

    /// `Σ score * weight` over scored units.
    pub weighted_score: f64,

    /// `Σ weight` over scored units.
    pub weight_sum: f64,

    /// Units in this section that produced a score.
    pub scored_units: usize,

    /// `weighted_score / weight_sum`, or `0.0` when nothing scored.
    pub score: f64,
}

/// Aggregated scores for one agent's full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    /// Sections in first-seen unit order.
    pub sections: Vec<SectionScore>,

    /// Type-weighted mean across sections that scored at least one unit.
    pub overall: f64,

    /// Band for the overall score.
    pub label: ScoreLabel,

    /// Units that produced a score.
    pub scored_units: usize,

    /// Units excluded after exhausting retries.
    pub failed_units: usize,
}

impl Scorecard {
    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&SectionScore> {
        self.sections.iter().find(|s| s.section == name)
    }
}

/// Reduce unit results into a [`Scorecard`].
///
/// Null-score units contribute to neither numerator nor denominator: a
/// failed unit is excluded, not zeroed, so partial results stay
/// statistically meaningful. A section where everything failed degrades to
/// `0.0` instead of erroring, and sections with no scored unit are left out
/// of the overall mean entirely.
pub fn aggregate(results: &[UnitResult]) -> Scorecard {
    let mut sections: Vec<SectionScore> = Vec::new();
    let mut scored_units = 0usize;
    let mut failed_units = 0usize;

    for result in results {
        let idx = match sections
            .iter()
            .position(|s| s.section == result.unit.type_name)
        {
            Some(i) => i,
            None => {
                sections.push(SectionScore {
                    section: result.unit.type_name.clone(),
                    type_weight: result.unit.type_weight,
                    weighted_score: 0.0,
                    weight_sum: 0.0,
                    scored_units: 0,
                    score: 0.0,
                });
                sections.len() - 1
            }
        };
        let section = &mut sections[idx];

        match result.score {
            Some(score) => {
                section.weighted_score += score * result.unit.weight;
                section.weight_sum += result.unit.weight;
                section.scored_units += 1;
                scored_units += 1;
            }
            None => failed_units += 1,
        }
    }

    for section in &mut sections {
        section.score = if section.weight_sum > 0.0 {
            section.weighted_score / section.weight_sum
        } else {
            0.0
        };
    }

    let mut overall_num = 0.0;
    let mut overall_den = 0.0;
    for section in &sections {
        if section.scored_units > 0 {
            overall_num += section.score * section.type_weight;
            overall_den += section.type_weight;
        }
    }
    let overall = if overall_den > 0.0 {
        overall_num / overall_den
    } else {
        0.0
    };

    Scorecard {
        sections,
        overall,
        label: ScoreLabel::for_score(overall),
        scored_units,
        failed_units,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelgrade_rubric::{ScoringLevels, ScoringUnit};

    fn result(
        type_name: &str,
        type_weight: f64,
        sub: &str,
        weight: f64,
        score: Option<f64>,
    ) -> UnitResult {
        UnitResult {
            unit: ScoringUnit {
                type_name: type_name.to_string(),
                type_weight,
                category: "Risk".to_string(),
                sub_category: sub.to_string(),
                description: String::new(),
                scoring: ScoringLevels::default(),
                weight,
            },
            score,
            evidence: String::new(),
            reasoning: String::new(),
            improvements: String::new(),
            attempts: 1,
        }
    }

    #[test]
    fn test_worked_example_single_type() {
        // One Type "Technical" (weight 70) with two 0.5-weight leaves
        // scoring 4.0 and 2.0: section = 3.0, overall = 3.0, "satisfactory".
        let results = vec![
            result("Technical", 70.0, "Schedule", 0.5, Some(4.0)),
            result("Technical", 70.0, "Technical", 0.5, Some(2.0)),
        ];
        let card = aggregate(&results);

        let section = card.section("Technical").unwrap();
        assert!((section.score - 3.0).abs() < 1e-9);
        assert!((section.weighted_score - 3.0).abs() < 1e-9);
        assert!((section.weight_sum - 1.0).abs() < 1e-9);
        assert!((card.overall - 3.0).abs() < 1e-9);
        assert_eq!(card.label, ScoreLabel::Satisfactory);
    }

    #[test]
    fn test_null_exclusion_law() {
        // A null-score unit yields the same section score as removing it.
        let with_null = vec![
            result("Technical", 100.0, "A", 0.4, Some(3.5)),
            result("Technical", 100.0, "B", 0.4, Some(2.5)),
            result("Technical", 100.0, "C", 0.2, None),
        ];
        let without = vec![
            result("Technical", 100.0, "A", 0.4, Some(3.5)),
            result("Technical", 100.0, "B", 0.4, Some(2.5)),
        ];

        let a = aggregate(&with_null);
        let b = aggregate(&without);
        assert_eq!(
            a.section("Technical").unwrap().score,
            b.section("Technical").unwrap().score
        );
        assert_eq!(a.overall, b.overall);
        assert_eq!(a.failed_units, 1);
        assert_eq!(b.failed_units, 0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let results = vec![
            result("Technical", 70.0, "A", 0.3, Some(3.0)),
            result("Commercial", 30.0, "B", 0.7, Some(2.5)),
            result("Commercial", 30.0, "C", 0.3, None),
        ];
        let first = aggregate(&results);
        let second = aggregate(&results);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_all_failed_section_degrades_to_zero() {
        let results = vec![
            result("Technical", 70.0, "A", 0.5, None),
            result("Technical", 70.0, "B", 0.5, None),
            result("Commercial", 30.0, "C", 1.0, Some(3.0)),
        ];
        let card = aggregate(&results);

        assert_eq!(card.section("Technical").unwrap().score, 0.0);
        // The dead section is excluded from the overall mean, so the
        // overall is carried entirely by Commercial.
        assert!((card.overall - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_scored_units_at_all() {
        let results = vec![result("Technical", 100.0, "A", 0.5, None)];
        let card = aggregate(&results);
        assert_eq!(card.overall, 0.0);
        assert_eq!(card.label, ScoreLabel::Unsatisfactory);
    }

    #[test]
    fn test_multi_section_type_weighting() {
        let results = vec![
            result("Technical", 70.0, "A", 1.0, Some(4.0)),
            result("Commercial", 30.0, "B", 1.0, Some(2.0)),
        ];
        let card = aggregate(&results);
        // (4.0*70 + 2.0*30) / 100 = 3.4
        assert!((card.overall - 3.4).abs() < 1e-9);
        assert_eq!(card.label, ScoreLabel::Satisfactory);
    }

    #[test]
    fn test_label_boundaries_lower_bound_inclusive() {
        assert_eq!(ScoreLabel::for_score(1.0), ScoreLabel::Unsatisfactory);
        assert_eq!(ScoreLabel::for_score(1.99), ScoreLabel::Unsatisfactory);
        assert_eq!(ScoreLabel::for_score(2.0), ScoreLabel::Marginal);
        assert_eq!(ScoreLabel::for_score(2.99), ScoreLabel::Marginal);
        assert_eq!(ScoreLabel::for_score(3.0), ScoreLabel::Satisfactory);
        assert_eq!(ScoreLabel::for_score(3.49), ScoreLabel::Satisfactory);
        assert_eq!(ScoreLabel::for_score(3.5), ScoreLabel::Superior);
        assert_eq!(ScoreLabel::for_score(4.0), ScoreLabel::Superior);
    }

    #[test]
    fn test_sections_keep_first_seen_order() {
        let results = vec![
            result("Zeta", 50.0, "A", 1.0, Some(3.0)),
            result("Alpha", 50.0, "B", 1.0, Some(3.0)),
        ];
        let card = aggregate(&results);
        assert_eq!(card.sections[0].section, "Zeta");
        assert_eq!(card.sections[1].section, "Alpha");
    }
}
