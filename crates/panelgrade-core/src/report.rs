//! Run outputs: incremental CSV audit trail, scorecard JSON, and markdown
//! reports.
//!
//! The audit sink writes one row per unit as it reaches a terminal state,
//! so a crashed run still leaves a partial, valid trail on disk; the
//! summary block lands only when the run finishes.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::aggregate::Scorecard;
use crate::agents::AgentOutput;
use crate::error::Result;
use crate::scheduler::{ScoreSink, UnitResult};

const AUDIT_COLUMNS: [&str; 9] = [
    "section",
    "category",
    "sub_category",
    "score",
    "weight",
    "weighted_score",
    "evidence",
    "reasoning",
    "improvements",
];

/// Incremental CSV audit trail.
pub struct CsvAuditSink {
    file: Mutex<tokio::fs::File>,
}

impl CsvAuditSink {
    /// Create the file and write the header row.
    pub async fn create(path: &Path) -> Result<Self> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(csv_row(&AUDIT_COLUMNS).as_bytes()).await?;
        file.flush().await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append the per-section and overall summary block.
    pub async fn finish(&self, card: &Scorecard) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(csv_row(&["", "", "", "", "", "", "", "", ""]).as_bytes())
            .await?;
        for section in &card.sections {
            file.write_all(
                csv_row(&[
                    &section.section,
                    "",
                    "",
                    &format!("{:.2}", section.score),
                    &format!("{:.2}", section.type_weight),
                    &format!("{:.4}", section.weighted_score),
                    "",
                    "",
                    "",
                ])
                .as_bytes(),
            )
            .await?;
        }
        file.write_all(
            csv_row(&[
                "OVERALL",
                "",
                "",
                &format!("{:.2}", card.overall),
                "",
                "",
                "",
                "",
                card.label.as_str(),
            ])
            .as_bytes(),
        )
        .await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ScoreSink for CsvAuditSink {
    async fn record(&self, result: &UnitResult) -> Result<()> {
        let score = result
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_default();
        let weighted = result
            .weighted_score()
            .map(|w| format!("{w:.4}"))
            .unwrap_or_default();
        let row = csv_row(&[
            &result.unit.type_name,
            &result.unit.category,
            &result.unit.sub_category,
            &score,
            &format!("{:.4}", result.unit.weight),
            &weighted,
            &result.evidence,
            &result.reasoning,
            &result.improvements,
        ]);

        let mut file = self.file.lock().await;
        file.write_all(row.as_bytes()).await?;
        // Flushed per row so a crash leaves everything recorded so far.
        file.flush().await?;
        Ok(())
    }
}

fn csv_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the markdown evaluation report for one scoring run.
pub fn render_report(card: &Scorecard, results: &[UnitResult]) -> String {
    let mut report = String::from("# Proposal Evaluation Report\n\n");

    report.push_str(&format!(
        "## Overall Score: {:.2}/4 ({})\n\n",
        card.overall, card.label
    ));

    report.push_str("## Section Scores\n\n");
    for section in &card.sections {
        report.push_str(&format!(
            "### {}: {:.2}/4 (weight {:.0}%)\n\n",
            section.section, section.score, section.type_weight
        ));
    }

    report.push_str("## Detailed Evaluation\n\n");
    for result in results {
        report.push_str(&format!("### {}\n\n", result.unit.display_name()));
        match result.score {
            Some(score) => report.push_str(&format!("- **Score**: {score:.1}/4\n")),
            None => report.push_str("- **Score**: could not score\n"),
        }
        report.push_str(&format!(
            "- **Weight**: {:.0}%\n",
            result.unit.weight * 100.0
        ));
        if !result.reasoning.is_empty() {
            report.push_str(&format!("- **Reasoning**: {}\n", result.reasoning));
        }
        if !result.evidence.is_empty() {
            report.push_str(&format!("- **Evidence**: {}\n", result.evidence));
        }
        if !result.improvements.is_empty() {
            report.push_str(&format!("- **Improvements**: {}\n", result.improvements));
        }
        report.push('\n');
    }

    report
}

/// Save consolidated scores as `scorecard.json`.
pub async fn save_scorecard_json(
    scores: &std::collections::BTreeMap<String, f64>,
    dir: &Path,
) -> Result<()> {
    let path = dir.join("scorecard.json");
    let body = serde_json::to_string_pretty(scores)?;
    tokio::fs::write(&path, body).await?;
    info!(path = %path.display(), "saved scorecard");
    Ok(())
}

/// Save one agent's feedback under `feedback/<agent_id>.md`.
pub async fn save_agent_feedback(output: &AgentOutput, dir: &Path) -> Result<()> {
    let feedback_dir = dir.join("feedback");
    tokio::fs::create_dir_all(&feedback_dir).await?;

    let mut body = format!("# {} Review\n\n{}\n", output.agent_id, output.feedback);
    if !output.scores.is_empty() {
        body.push_str("\n## Scores\n\n");
        for (criterion, score) in &output.scores {
            body.push_str(&format!("- **{criterion}**: {score}\n"));
        }
    }
    if !output.action_items.is_empty() {
        body.push_str("\n## Action Items\n\n");
        for (i, item) in output.action_items.iter().enumerate() {
            body.push_str(&format!("{}. {item}\n", i + 1));
        }
    }

    let path = feedback_dir.join(format!("{}.md", output.agent_id.to_lowercase()));
    tokio::fs::write(&path, body).await?;
    info!(path = %path.display(), "saved agent feedback");
    Ok(())
}

/// Save the consolidated summary as `summary.md`.
pub async fn save_summary(summary: &str, dir: &Path) -> Result<()> {
    let path = dir.join("summary.md");
    tokio::fs::write(&path, summary).await?;
    info!(path = %path.display(), "saved summary");
    Ok(())
}

/// Save consolidated action items as `action_items.md`.
pub async fn save_action_items(items: &[String], dir: &Path) -> Result<()> {
    let mut body = String::from("# Action Items\n\n");
    for (i, item) in items.iter().enumerate() {
        body.push_str(&format!("{}. {item}\n", i + 1));
    }
    let path = dir.join("action_items.md");
    tokio::fs::write(&path, body).await?;
    info!(path = %path.display(), "saved action items");
    Ok(())
}
