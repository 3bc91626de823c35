//! Turning an input file or pasted text into a list of batch queries.

use crate::error::{Error, Result};
use crate::extractor::decode_text;
use crate::extractor::docx::{self, DocxBlock};
use crate::extractor::pdf;
use crate::extractor::tabular::{self, find_question_column, is_missing_value, Table};
use crate::record::SourceType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Paragraphs (and spreadsheet lines) shorter than this are not worth checking.
const MIN_PARAGRAPH_CHARS: usize = 20;
/// PDF lines shorter than this are usually headers, footers or page numbers.
const MIN_PDF_LINE_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Each line (or cell of the question column) is one query
    #[default]
    Questions,
    /// Each paragraph of a document is checked against known questions
    Document,
}

impl FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "questions" | "question" => Ok(BatchMode::Questions),
            "document" | "paragraphs" => Ok(BatchMode::Document),
            other => Err(format!("unknown batch mode '{}'", other)),
        }
    }
}

/// Split pasted text into queries.
pub fn queries_from_text(text: &str, mode: BatchMode) -> Vec<String> {
    match mode {
        BatchMode::Questions => non_empty_lines(text, 1),
        BatchMode::Document => paragraphs(text),
    }
}

/// Read queries from a file. `column` picks the spreadsheet column in
/// question mode; without it the first question-like header (or the first
/// column) is used.
pub fn load_queries(path: &Path, mode: BatchMode, column: Option<&str>) -> Result<Vec<String>> {
    let source_type = SourceType::from_path(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let queries = match source_type {
        SourceType::Txt => {
            let bytes = std::fs::read(path)
                .map_err(|e| Error::parse(path, format!("failed to read file: {}", e)))?;
            let text = decode_text(path, &bytes)?;
            queries_from_text(&text, mode)
        }
        SourceType::Pdf => {
            let text = pdf::extract_pdf_text(path)?;
            match mode {
                BatchMode::Questions => non_empty_lines(&text, MIN_PDF_LINE_CHARS + 1),
                BatchMode::Document => paragraphs(&text),
            }
        }
        SourceType::Docx => {
            let mut lines = Vec::new();
            for block in docx::read_docx(path)? {
                match block {
                    DocxBlock::Text(text) => lines.extend(non_empty_lines(&text, 1)),
                    DocxBlock::Table(table) => lines.extend(non_empty_lines(&table.flatten(), 1)),
                }
            }
            match mode {
                BatchMode::Questions => lines,
                BatchMode::Document => lines
                    .into_iter()
                    .filter(|l| l.chars().count() > MIN_PARAGRAPH_CHARS)
                    .collect(),
            }
        }
        SourceType::Csv => table_queries(path, &[tabular::read_csv(path)?], mode, column)?,
        SourceType::Xlsx => table_queries(path, &tabular::read_workbook(path)?, mode, column)?,
    };

    tracing::debug!(file = %path.display(), queries = queries.len(), "batch queries loaded");
    Ok(queries)
}

fn table_queries(path: &Path, tables: &[Table], mode: BatchMode, column: Option<&str>) -> Result<Vec<String>> {
    // Only the first sheet is used for batch input
    let Some(table) = tables.first() else {
        return Ok(Vec::new());
    };

    match mode {
        BatchMode::Document => Ok(non_empty_lines(&table.flatten(), MIN_PARAGRAPH_CHARS + 1)),
        BatchMode::Questions => {
            let idx = match column {
                Some(name) => table
                    .headers
                    .iter()
                    .position(|h| h.trim() == name.trim())
                    .ok_or_else(|| {
                        Error::parse(path, format!("column '{}' not found", name))
                    })?,
                None => find_question_column(&table.headers).unwrap_or(0),
            };
            Ok(table
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.trim())
                .filter(|cell| !is_missing_value(cell))
                .map(str::to_string)
                .collect())
        }
    }
}

/// Trimmed lines with at least `min_chars` characters.
fn non_empty_lines(text: &str, min_chars: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.chars().count() >= min_chars)
        .map(str::to_string)
        .collect()
}

/// Blank-line separated paragraphs over the length floor; when the text has
/// no such paragraphs, long single lines are used instead.
fn paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let found: Vec<String> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
        .map(str::to_string)
        .collect();
    if !found.is_empty() {
        return found;
    }
    non_empty_lines(&normalized, MIN_PARAGRAPH_CHARS + 1)
}
