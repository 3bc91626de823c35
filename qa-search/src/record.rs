//! Records produced by extraction and returned by search.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Document family a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Docx,
    /// XLSX and legacy XLS workbooks.
    Xlsx,
    Csv,
    Txt,
}

impl SourceType {
    /// Map a file extension (case-insensitive, without the dot) to a source type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(SourceType::Pdf),
            "docx" => Some(SourceType::Docx),
            "xlsx" | "xls" => Some(SourceType::Xlsx),
            "csv" => Some(SourceType::Csv),
            "txt" => Some(SourceType::Txt),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Docx => "docx",
            SourceType::Xlsx => "xlsx",
            SourceType::Csv => "csv",
            SourceType::Txt => "txt",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::from_extension(s).ok_or_else(|| format!("unknown source type '{}'", s))
    }
}

/// Which recognizer produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPattern {
    /// `Q:` / `A:` (also `Q.` / `A.`)
    ColonMarker,
    /// `Q1:` / `A1:`
    NumberedMarker,
    /// `質問:` / `回答:`
    JapaneseColon,
    /// `【質問】` / `【回答】`
    JapaneseBracket,
    /// Question/answer columns found by header name.
    TableColumns,
    /// Paragraph fallback, only when enabled in settings.
    Paragraph,
}

impl ExtractionPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPattern::ColonMarker => "colon_marker",
            ExtractionPattern::NumberedMarker => "numbered_marker",
            ExtractionPattern::JapaneseColon => "japanese_colon",
            ExtractionPattern::JapaneseBracket => "japanese_bracket",
            ExtractionPattern::TableColumns => "table_columns",
            ExtractionPattern::Paragraph => "paragraph",
        }
    }
}

impl std::fmt::Display for ExtractionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "colon_marker" => Ok(ExtractionPattern::ColonMarker),
            "numbered_marker" => Ok(ExtractionPattern::NumberedMarker),
            "japanese_colon" => Ok(ExtractionPattern::JapaneseColon),
            "japanese_bracket" => Ok(ExtractionPattern::JapaneseBracket),
            "table_columns" => Ok(ExtractionPattern::TableColumns),
            "paragraph" => Ok(ExtractionPattern::Paragraph),
            other => Err(format!("unknown extraction pattern '{}'", other)),
        }
    }
}

/// A question/answer pair extracted from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub source_file: PathBuf,
    pub source_type: SourceType,
    pub extraction_pattern: ExtractionPattern,
    /// Worksheet name for spreadsheet sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl QaRecord {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        source_file: impl Into<PathBuf>,
        source_type: SourceType,
        extraction_pattern: ExtractionPattern,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            source_file: source_file.into(),
            source_type,
            extraction_pattern,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Human-readable source label: `file.xlsx - Sheet1` or `file.pdf`.
    pub fn source_label(&self) -> String {
        let file_name = self
            .source_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        match &self.location {
            Some(loc) => format!("{} - {}", file_name, loc),
            None => file_name.to_string(),
        }
    }
}

/// A stored record with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddingEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub record: QaRecord,
}

/// One ranked hit for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record: QaRecord,
    /// Cosine similarity clamped to [0, 1]
    pub similarity_score: f32,
}
