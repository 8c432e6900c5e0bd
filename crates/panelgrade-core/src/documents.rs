//! Document contracts: extraction results, bundle validation, and
//! section-text routing.
//!
//! The format-specific readers (PDF, DOCX, XLSX) live outside this crate;
//! the pipeline only depends on the [`DocumentReader`] seam and the
//! [`ExtractedDocument`] shape it returns. A plain-text/markdown reader
//! ships in-tree so the pipeline is runnable without external tooling.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

/// One titled slice of an extracted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub title: String,
    pub content: String,
    pub level: u32,
}

/// The text a document reader extracted from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub file_name: String,
    pub format: String,
    pub full_text: String,
    pub sections: Vec<DocumentSection>,
    pub page_count: Option<u32>,
}

impl ExtractedDocument {
    /// Wrap already-extracted text, deriving sections from markdown headers.
    pub fn from_text(file_name: &str, text: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            format: "text".to_string(),
            full_text: text.to_string(),
            sections: split_sections(text),
            page_count: None,
        }
    }

    /// Readers must fail loudly rather than hand back empty text; an empty
    /// proposal is fatal, not "score everything as unsatisfactory".
    pub fn ensure_text(&self) -> Result<()> {
        if self.full_text.trim().is_empty() {
            return Err(CoreError::EmptyDocument {
                file_name: self.file_name.clone(),
            });
        }
        Ok(())
    }
}

/// Extraction seam implemented by format-specific readers.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<ExtractedDocument>;
}

/// Reads plain-text and markdown files.
pub struct PlainTextReader;

#[async_trait]
impl DocumentReader for PlainTextReader {
    async fn read(&self, path: &Path) -> Result<ExtractedDocument> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CoreError::Document {
                file_name: file_name.clone(),
                detail: e.to_string(),
            }
        })?;

        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("md") => "markdown",
            _ => "text",
        };
        let doc = ExtractedDocument {
            file_name,
            format: format.to_string(),
            full_text: text.clone(),
            sections: split_sections(&text),
            page_count: None,
        };
        doc.ensure_text()?;
        Ok(doc)
    }
}

fn split_sections(text: &str) -> Vec<DocumentSection> {
    let mut sections = Vec::new();
    let mut current: Option<DocumentSection> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            let level = trimmed.chars().take_while(|&c| c == '#').count() as u32;
            current = Some(DocumentSection {
                title: trimmed.trim_start_matches('#').trim().to_string(),
                content: String::new(),
                level,
            });
        } else if let Some(section) = current.as_mut() {
            section.content.push_str(line);
            section.content.push('\n');
        }
    }
    if let Some(section) = current {
        sections.push(section);
    }
    sections
}

/// The documents one review run operates on.
#[derive(Debug, Clone)]
pub struct DocumentBundle {
    pub proposal: ExtractedDocument,
    pub supporting: Vec<ExtractedDocument>,
}

impl DocumentBundle {
    /// Build a bundle, validating every document has text.
    pub fn new(proposal: ExtractedDocument, supporting: Vec<ExtractedDocument>) -> Result<Self> {
        proposal.ensure_text()?;
        for doc in &supporting {
            doc.ensure_text()?;
        }
        Ok(Self {
            proposal,
            supporting,
        })
    }

    /// Route section text for a rubric type.
    ///
    /// A supporting document whose file name contains the lower-cased type
    /// name wins; otherwise the main proposal text is used. The result is
    /// truncated to `char_budget` characters.
    pub fn section_text(&self, type_name: &str, char_budget: usize) -> String {
        let needle = type_name.to_lowercase();
        let text = self
            .supporting
            .iter()
            .find(|d| d.file_name.to_lowercase().contains(&needle))
            .map(|d| d.full_text.as_str())
            .unwrap_or(self.proposal.full_text.as_str());
        truncate_chars(text, char_budget)
    }

    /// All supporting documents concatenated with file-name separators.
    pub fn supporting_text(&self) -> String {
        let mut out = String::new();
        for doc in &self.supporting {
            out.push_str(&format!("\n\n--- {} ---\n", doc.file_name));
            out.push_str(&doc.full_text);
        }
        out
    }
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if budget == 0 {
        return text.to_string();
    }
    text.chars().take(budget).collect()
}

/// Names from `required` with no matching file in `dir`.
pub fn missing_documents(dir: &Path, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !dir.join(name).exists())
        .cloned()
        .collect()
}

/// Fail with [`CoreError::MissingDocuments`] unless every required file is
/// present. Runs before any oracle call so an unscoreable bundle never
/// charges the oracle budget.
pub fn validate_bundle_dir(dir: &Path, required: &[String]) -> Result<()> {
    let missing = missing_documents(dir, required);
    if !missing.is_empty() {
        warn!(dir = %dir.display(), ?missing, "bundle is missing required documents");
        return Err(CoreError::MissingDocuments { missing });
    }
    debug!(dir = %dir.display(), "bundle contains all required documents");
    Ok(())
}

/// Read the proposal and every supporting file into a bundle.
pub async fn load_bundle(
    reader: &dyn DocumentReader,
    proposal_path: &Path,
    supporting_paths: &[PathBuf],
) -> Result<DocumentBundle> {
    let proposal = reader.read(proposal_path).await?;
    let mut supporting = Vec::with_capacity(supporting_paths.len());
    for path in supporting_paths {
        supporting.push(reader.read(path).await?);
    }
    DocumentBundle::new(proposal, supporting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_text_splits_markdown_sections() {
        let doc = ExtractedDocument::from_text(
            "prop.md",
            "# Title\nintro\n## Approach\nwe do things\n",
        );
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title, "Title");
        assert_eq!(doc.sections[0].level, 1);
        assert_eq!(doc.sections[1].title, "Approach");
        assert_eq!(doc.sections[1].level, 2);
        assert!(doc.sections[1].content.contains("we do things"));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let doc = ExtractedDocument::from_text("empty.md", "   \n");
        assert!(matches!(
            doc.ensure_text(),
            Err(CoreError::EmptyDocument { .. })
        ));
    }

    #[test]
    fn test_bundle_rejects_empty_supporting_doc() {
        let proposal = ExtractedDocument::from_text("prop.md", "real text");
        let empty = ExtractedDocument::from_text("blank.md", "");
        assert!(DocumentBundle::new(proposal, vec![empty]).is_err());
    }

    #[test]
    fn test_section_text_routes_by_type_name() {
        let bundle = DocumentBundle::new(
            ExtractedDocument::from_text("tech_proposal.md", "technical body"),
            vec![ExtractedDocument::from_text(
                "commercial_proposal.md",
                "commercial body",
            )],
        )
        .unwrap();

        assert_eq!(bundle.section_text("Commercial", 0), "commercial body");
        // No supporting match: falls back to the main proposal.
        assert_eq!(bundle.section_text("Management", 0), "technical body");
    }

    #[test]
    fn test_section_text_respects_char_budget() {
        let bundle = DocumentBundle::new(
            ExtractedDocument::from_text("prop.md", "abcdefghij"),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(bundle.section_text("Technical", 4), "abcd");
    }

    #[test]
    fn test_missing_documents_lists_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("tech_proposal.md")).unwrap();
        writeln!(f, "text").unwrap();

        let required = vec![
            "tech_proposal.md".to_string(),
            "budget.csv".to_string(),
        ];
        let missing = missing_documents(dir.path(), &required);
        assert_eq!(missing, vec!["budget.csv".to_string()]);
        assert!(matches!(
            validate_bundle_dir(dir.path(), &required),
            Err(CoreError::MissingDocuments { .. })
        ));
    }

    #[tokio::test]
    async fn test_plain_text_reader_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n").unwrap();

        let err = PlainTextReader.read(&path).await.unwrap_err();
        assert!(matches!(err, CoreError::EmptyDocument { .. }));
    }

    #[tokio::test]
    async fn test_plain_text_reader_reads_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prop.md");
        std::fs::write(&path, "# Plan\nShip it.\n").unwrap();

        let doc = PlainTextReader.read(&path).await.unwrap();
        assert_eq!(doc.format, "markdown");
        assert_eq!(doc.sections[0].title, "Plan");
    }
}
