//! Proposal compliance checks, run before any scoring spend.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::documents::ExtractedDocument;

/// Solicitation limits a bundle must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceLimits {
    /// Maximum technical proposal page count.
    pub proposal_page_limit: u32,

    /// Maximum total budget in dollars.
    pub max_budget: f64,

    /// Maximum subcontract share of the total budget.
    pub max_subcontract_ratio: f64,
}

impl Default for ComplianceLimits {
    fn default() -> Self {
        Self {
            proposal_page_limit: 15,
            max_budget: 150_000.0,
            max_subcontract_ratio: 0.33,
        }
    }
}

/// Budget figures extracted from the budget spreadsheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total: f64,
    pub taba: f64,
    pub subcontract_total: f64,
}

/// Outcome of the compliance pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    /// Whether every check passed.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,
}

/// Check the proposal and budget against the solicitation limits.
pub fn check(
    proposal: &ExtractedDocument,
    budget: Option<&BudgetSummary>,
    limits: &ComplianceLimits,
) -> ComplianceVerdict {
    let mut violations = Vec::new();

    if let Some(pages) = proposal.page_count {
        if pages > limits.proposal_page_limit {
            violations.push(format!(
                "proposal has {pages} pages, limit is {}",
                limits.proposal_page_limit
            ));
        }
    }

    if let Some(budget) = budget {
        if budget.total > limits.max_budget {
            violations.push(format!(
                "budget total {:.2} exceeds limit {:.2}",
                budget.total, limits.max_budget
            ));
        }
        if budget.subcontract_total > 0.0 && budget.total > 0.0 {
            let ratio = budget.subcontract_total / budget.total;
            if ratio > limits.max_subcontract_ratio {
                violations.push(format!(
                    "subcontract ratio {:.2} exceeds limit {:.2}",
                    ratio, limits.max_subcontract_ratio
                ));
            }
        }
    }

    if !violations.is_empty() {
        warn!(count = violations.len(), "compliance violations found");
    }

    ComplianceVerdict {
        passed: violations.is_empty(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal_with_pages(pages: u32) -> ExtractedDocument {
        let mut doc = ExtractedDocument::from_text("tech_proposal.md", "body");
        doc.page_count = Some(pages);
        doc
    }

    #[test]
    fn test_compliant_bundle_passes() {
        let verdict = check(
            &proposal_with_pages(12),
            Some(&BudgetSummary {
                total: 100_000.0,
                taba: 5_000.0,
                subcontract_total: 20_000.0,
            }),
            &ComplianceLimits::default(),
        );
        assert!(verdict.passed);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_page_limit_violation() {
        let verdict = check(&proposal_with_pages(20), None, &ComplianceLimits::default());
        assert!(!verdict.passed);
        assert!(verdict.violations[0].contains("20 pages"));
    }

    #[test]
    fn test_budget_and_ratio_violations_accumulate() {
        let verdict = check(
            &proposal_with_pages(10),
            Some(&BudgetSummary {
                total: 200_000.0,
                taba: 0.0,
                subcontract_total: 120_000.0,
            }),
            &ComplianceLimits::default(),
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.violations.len(), 2);
    }

    #[test]
    fn test_unknown_page_count_is_not_a_violation() {
        let doc = ExtractedDocument::from_text("tech_proposal.md", "body");
        let verdict = check(&doc, None, &ComplianceLimits::default());
        assert!(verdict.passed);
    }
}
