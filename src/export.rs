//! Spreadsheet export of a result set as CSV.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{Role, Row};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const SLUG_MAX_LEN: usize = 40;

/// Leading characters a spreadsheet reads as the start of a formula.
const FORMULA_TRIGGERS: &[char] = &['=', '+', '-', '@', '\t', '\r'];

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to finish CSV output: {0}")]
    Flush(String),
}

pub fn render_csv(rows: &[Row], question: &str, role: Role) -> Result<ExportFile, ExportError> {
    render_csv_at(rows, question, role, Utc::now())
}

pub(crate) fn render_csv_at(
    rows: &[Row],
    question: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<ExportFile, ExportError> {
    let columns = column_order(rows);
    let mut writer = csv::Writer::from_writer(Vec::new());

    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for row in rows {
        writer.write_record(columns.iter().map(|c| cell_text(row.get(*c))))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;

    Ok(ExportFile {
        bytes,
        filename: format!(
            "{}_{}_{}.csv",
            role.as_str(),
            slugify(question),
            now.format("%Y%m%d_%H%M%S")
        ),
        content_type: CSV_CONTENT_TYPE,
    })
}

/// Union of row keys, first-seen order.
fn column_order(rows: &[Row]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for key in rows.iter().flat_map(|r| r.keys()) {
        if !columns.contains(&key.as_str()) {
            columns.push(key);
        }
    }
    columns
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => neutralize_formula(s),
        Some(other) => other.to_string(),
    }
}

/// Text cells that would open as a formula get a leading `'`. Numbers are
/// written as-is so negative values stay numeric.
fn neutralize_formula(text: &str) -> String {
    if text.starts_with(FORMULA_TRIGGERS) {
        format!("'{text}")
    } else {
        text.to_string()
    }
}

fn slugify(question: &str) -> String {
    let mut slug = String::new();
    let mut pending_sep = false;
    for ch in question.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
        if slug.len() >= SLUG_MAX_LEN {
            break;
        }
    }
    if slug.is_empty() {
        "export".to_string()
    } else {
        slug
    }
}
