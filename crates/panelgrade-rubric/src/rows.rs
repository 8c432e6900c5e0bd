//! Flat rubric and criteria row tables, with a minimal delimited-record reader.
//!
//! The heavy document readers (PDF/XLSX extraction) live outside this crate;
//! what arrives here is tabular text. The record reader handles quoted
//! fields, embedded commas, and embedded newlines so solicitation tables
//! exported from spreadsheets survive the trip.

use std::collections::BTreeMap;

use crate::error::{Result, RubricError};
use crate::tree::ScoringLevels;

/// One row of the evaluation rubric table.
#[derive(Debug, Clone, PartialEq)]
pub struct RubricRow {
    pub type_name: String,
    pub type_weight: f64,
    pub category: String,
    pub category_weight: f64,
    pub sub_category: String,
    pub scoring: ScoringLevels,
}

/// Lookup from `(type, category, sub-category)` to freeform definition text.
#[derive(Debug, Clone, Default)]
pub struct CriteriaTable {
    definitions: BTreeMap<(String, String, String), String>,
}

impl CriteriaTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition for an exact triple.
    pub fn insert(&mut self, type_name: &str, category: &str, sub_category: &str, text: &str) {
        self.definitions.insert(
            (
                type_name.to_string(),
                category.to_string(),
                sub_category.to_string(),
            ),
            text.trim().to_string(),
        );
    }

    /// Exact-triple lookup.
    pub fn definition(&self, type_name: &str, category: &str, sub_category: &str) -> Option<&str> {
        self.definitions
            .get(&(
                type_name.to_string(),
                category.to_string(),
                sub_category.to_string(),
            ))
            .map(String::as_str)
    }

    /// Number of definitions held.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Columns required in the rubric table.
const RUBRIC_COLUMNS: [&str; 9] = [
    "Type",
    "Type Weight",
    "Category",
    "Category Weight",
    "Sub-Category",
    "Unsatisfactory",
    "Marginal",
    "Satisfactory",
    "Superior",
];

/// Columns required in the criteria-description table.
const CRITERIA_COLUMNS: [&str; 4] = ["Type", "Category", "Sub-Category", "Definition"];

/// Parse the rubric table from delimited text.
///
/// The header is validated before any row is read, so a missing column
/// fails fast without partial output. Non-numeric weights fail with the
/// offending row number.
pub fn parse_rubric_table(text: &str) -> Result<Vec<RubricRow>> {
    let records = read_records(text)?;
    let mut iter = records.into_iter();
    let header = match iter.next() {
        Some(h) => Header::new(&h, &RUBRIC_COLUMNS)?,
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for (idx, record) in iter.enumerate() {
        let row_no = idx + 1;
        header.check_width(row_no, &record)?;
        rows.push(RubricRow {
            type_name: header.field(&record, "Type").to_string(),
            type_weight: parse_weight(row_no, "Type Weight", header.field(&record, "Type Weight"))?,
            category: header.field(&record, "Category").to_string(),
            category_weight: parse_weight(
                row_no,
                "Category Weight",
                header.field(&record, "Category Weight"),
            )?,
            sub_category: header.field(&record, "Sub-Category").to_string(),
            scoring: ScoringLevels {
                unsatisfactory: header.field(&record, "Unsatisfactory").trim().to_string(),
                marginal: header.field(&record, "Marginal").trim().to_string(),
                satisfactory: header.field(&record, "Satisfactory").trim().to_string(),
                superior: header.field(&record, "Superior").trim().to_string(),
            },
        });
    }
    Ok(rows)
}

/// Parse the criteria-description table from delimited text.
pub fn parse_criteria_table(text: &str) -> Result<CriteriaTable> {
    let records = read_records(text)?;
    let mut iter = records.into_iter();
    let header = match iter.next() {
        Some(h) => Header::new(&h, &CRITERIA_COLUMNS)?,
        None => return Ok(CriteriaTable::new()),
    };

    let mut table = CriteriaTable::new();
    for (idx, record) in iter.enumerate() {
        header.check_width(idx + 1, &record)?;
        table.insert(
            header.field(&record, "Type"),
            header.field(&record, "Category"),
            header.field(&record, "Sub-Category"),
            header.field(&record, "Definition"),
        );
    }
    Ok(table)
}

/// Header row mapped to column indices.
struct Header {
    index: BTreeMap<String, usize>,
    width: usize,
}

impl Header {
    fn new(fields: &[String], required: &[&str]) -> Result<Self> {
        let index: BTreeMap<String, usize> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.trim().to_string(), i))
            .collect();
        for column in required {
            if !index.contains_key(*column) {
                return Err(RubricError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }
        // A record only has to reach the right-most required column.
        let width = required
            .iter()
            .map(|c| index[*c] + 1)
            .max()
            .unwrap_or(0);
        Ok(Self { index, width })
    }

    fn check_width(&self, row: usize, record: &[String]) -> Result<()> {
        if record.len() < self.width {
            return Err(RubricError::FieldCount {
                row,
                expected: self.width,
                actual: record.len(),
            });
        }
        Ok(())
    }

    fn field<'a>(&self, record: &'a [String], column: &str) -> &'a str {
        &record[self.index[column]]
    }
}

fn parse_weight(row: usize, column: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| RubricError::InvalidWeight {
            row,
            column: column.to_string(),
            value: value.trim().to_string(),
        })
}

/// Split delimited text into records of fields.
///
/// Quoted fields may contain commas, doubled quotes, and newlines. Blank
/// records are dropped.
pub fn read_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0usize;
    let mut line = 1usize;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
            }
            '\r' => {
                // Consumed as part of a CRLF terminator.
                if chars.peek() == Some(&'\n') {
                    continue;
                }
            }
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                if record.iter().any(|f| !f.trim().is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(RubricError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        if record.iter().any(|f| !f.trim().is_empty()) {
            records.push(record);
        }
    }
    Ok(records)
}
