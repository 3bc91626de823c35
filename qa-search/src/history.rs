//! In-memory search history and CSV export.
//!
//! Exported files start with a UTF-8 byte order mark so spreadsheet tools
//! detect the encoding of Japanese text.

use crate::error::Result;
use crate::record::SearchResult;
use crate::service::BatchMatch;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CSV_HEADER: [&str; 4] = ["question", "answer", "similarity_score", "timestamp"];

/// How a query reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Single,
    /// One query per line or spreadsheet row
    QuestionList,
    /// Paragraphs of a document checked against known questions
    DocumentCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub mode: QueryMode,
    pub query: String,
    /// Matched stored question
    pub question: String,
    pub answer: String,
    pub similarity_score: f32,
    pub source: String,
}

impl HistoryEntry {
    pub fn from_result(query: &str, mode: QueryMode, result: &SearchResult) -> Self {
        Self {
            timestamp: Local::now(),
            mode,
            query: query.to_string(),
            question: result.record.question.clone(),
            answer: result.record.answer.clone(),
            similarity_score: result.similarity_score,
            source: result.record.source_label(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchHistory {
    entries: Vec<HistoryEntry>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the best result of a query. Queries without results are not kept.
    pub fn record(&mut self, query: &str, mode: QueryMode, results: &[SearchResult]) {
        if let Some(best) = results.first() {
            self.entries.push(HistoryEntry::from_result(query, mode, best));
        }
    }

    pub fn record_batch(&mut self, matches: &[BatchMatch], mode: QueryMode) {
        for m in matches {
            self.record(&m.query, mode, &m.results);
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        write_csv_rows(
            writer,
            self.entries.iter().map(|e| CsvRow {
                question: &e.question,
                answer: &e.answer,
                similarity_score: e.similarity_score,
                timestamp: e.timestamp,
            }),
        )
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}

/// Best match per batch input; inputs without a match get empty cells and a
/// score of 0.
pub fn write_batch_csv<W: Write>(writer: W, matches: &[BatchMatch]) -> Result<()> {
    let now = Local::now();
    write_csv_rows(
        writer,
        matches.iter().map(|m| match m.best() {
            Some(best) => CsvRow {
                question: &best.record.question,
                answer: &best.record.answer,
                similarity_score: best.similarity_score,
                timestamp: now,
            },
            None => CsvRow {
                question: "",
                answer: "",
                similarity_score: 0.0,
                timestamp: now,
            },
        }),
    )
}

struct CsvRow<'a> {
    question: &'a str,
    answer: &'a str,
    similarity_score: f32,
    timestamp: DateTime<Local>,
}

fn write_csv_rows<'a, W: Write>(mut writer: W, rows: impl Iterator<Item = CsvRow<'a>>) -> Result<()> {
    writer.write_all(UTF8_BOM)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;
    for row in rows {
        csv_writer.write_record([
            row.question.to_string(),
            row.answer.to_string(),
            format!("{:.4}", row.similarity_score),
            row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}
