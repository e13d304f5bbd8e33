//! Price-list intake: `description;price` rows, no header.
//!
//! Rows that cannot be read are skipped with a warning; only a file with no
//! usable row at all is an error.

use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::warn;

use poster_labels_core::models::RawLine;
use poster_labels_core::process::parse_price;

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("line {line}: expected description and price, found {found} field(s)")]
    MissingField { line: usize, found: usize },
    #[error("line {line}: description is empty")]
    EmptyDescription { line: usize },
    #[error("line {line}: invalid price '{text}'")]
    BadPrice { line: usize, text: String },
    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },
}

/// Read a price list from disk.
///
/// Files that are not valid UTF-8 are decoded as Latin-1, which is what
/// spreadsheet exports on Brazilian Windows machines produce.
pub fn read_file(path: &Path, delimiter: char) -> Result<Vec<RawLine>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read price list: {}", path.display()))?;
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    };
    parse_rows(&text, delimiter)
        .with_context(|| format!("Failed to import price list: {}", path.display()))
}

/// Parse every row, skipping malformed ones.
pub fn parse_rows(text: &str, delimiter: char) -> Result<Vec<RawLine>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(idx + 1, line, delimiter) {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!("skipping row: {}", e);
            }
        }
    }

    if rows.is_empty() {
        anyhow::bail!("file has no valid rows");
    }
    if skipped > 0 {
        warn!(skipped, imported = rows.len(), "some rows were skipped");
    }
    Ok(rows)
}

/// Parse one physical line. `line_no` is 1-based and only used in errors.
pub fn parse_row(line_no: usize, line: &str, delimiter: char) -> Result<RawLine, RowError> {
    let fields =
        split_fields(line, delimiter).ok_or(RowError::UnterminatedQuote { line: line_no })?;
    if fields.len() < 2 {
        return Err(RowError::MissingField {
            line: line_no,
            found: fields.len(),
        });
    }

    let description = fields[0].trim();
    if description.is_empty() {
        return Err(RowError::EmptyDescription { line: line_no });
    }
    let price = parse_price(&fields[1]).map_err(|_| RowError::BadPrice {
        line: line_no,
        text: fields[1].trim().to_string(),
    })?;

    Ok(RawLine::new(description, price))
}

/// Split on `delimiter`, honouring double-quoted fields with `""` escapes.
/// Returns `None` when a quote is left open.
fn split_fields(line: &str, delimiter: char) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
        } else if c == '"' && current.trim().is_empty() {
            current.clear();
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(current);
    Some(fields)
}
