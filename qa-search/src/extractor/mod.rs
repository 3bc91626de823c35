//! Document extraction: files in, [`QaRecord`]s out.
//!
//! Extraction is synchronous and stateless. A file yields all of its records
//! or an error; "nothing recognized" is an empty vector, not an error.

pub mod docx;
pub mod patterns;
pub mod pdf;
pub mod tabular;

use crate::error::{Error, Result};
use crate::record::{QaRecord, SourceType};
use patterns::{extract_pairs, paragraph_pairs, ExtractedPair};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Knobs that change what counts as a record.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Turn long paragraphs into records when no marker matches.
    pub paragraph_fallback: bool,
}

/// A file that could not be extracted during a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Check if a file has one of the supported extensions.
pub fn is_supported_file(path: &Path) -> bool {
    SourceType::from_path(path).is_some()
}

/// Decode TXT/CSV bytes: UTF-8 (BOM stripped) first, then Shift_JIS/cp932.
pub(crate) fn decode_text(path: &Path, bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }
    let (text, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(Error::parse(path, "file is neither UTF-8 nor Shift_JIS"));
    }
    tracing::debug!(path = %path.display(), "decoded file as Shift_JIS");
    Ok(text.into_owned())
}

/// Extract Q/A records from a single file using default options.
pub fn extract(path: &Path) -> Result<Vec<QaRecord>> {
    extract_with(path, &ExtractOptions::default())
}

/// Extract Q/A records from a single file.
pub fn extract_with(path: &Path, options: &ExtractOptions) -> Result<Vec<QaRecord>> {
    let source_type = SourceType::from_path(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let label = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let to_records = |pairs: Vec<ExtractedPair>, location: Option<&str>| -> Vec<QaRecord> {
        pairs
            .into_iter()
            .map(|pair| {
                let record = QaRecord::new(pair.question, pair.answer, path, source_type, pair.pattern);
                match location {
                    Some(loc) => record.with_location(loc),
                    None => record,
                }
            })
            .collect()
    };

    let records = match source_type {
        SourceType::Txt => {
            let bytes = std::fs::read(path)
                .map_err(|e| Error::parse(path, format!("failed to read file: {}", e)))?;
            let text = decode_text(path, &bytes)?;
            to_records(text_pairs(&text, &label, options), None)
        }
        SourceType::Pdf => {
            let text = pdf::extract_pdf_text(path)?;
            to_records(text_pairs(&text, &label, options), None)
        }
        SourceType::Docx => {
            let mut records = Vec::new();
            for block in docx::read_docx(path)? {
                let pairs = match block {
                    docx::DocxBlock::Text(text) => text_pairs(&text, &label, options),
                    docx::DocxBlock::Table(table) => table.pairs(),
                };
                records.extend(to_records(pairs, None));
            }
            records
        }
        SourceType::Csv => to_records(tabular::read_csv(path)?.pairs(), None),
        SourceType::Xlsx => {
            let mut records = Vec::new();
            for table in tabular::read_workbook(path)? {
                let pairs = table.pairs();
                records.extend(to_records(pairs, table.name.as_deref()));
            }
            records
        }
    };

    tracing::debug!(
        file = %path.display(),
        source_type = %source_type,
        records = records.len(),
        "extracted records"
    );
    Ok(records)
}

fn text_pairs(text: &str, label: &str, options: &ExtractOptions) -> Vec<ExtractedPair> {
    let pairs = extract_pairs(text);
    if pairs.is_empty() && options.paragraph_fallback {
        return paragraph_pairs(text, label);
    }
    pairs
}

/// Every supported file under `dir`, recursively, sorted by path.
/// Hidden files and directories (leading `.`) are skipped.
pub fn collect_files_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_into(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_into(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        if entry.file_type()?.is_dir() {
            collect_into(&path, files)?;
        } else if is_supported_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Records from each file that extracted cleanly, plus the failures.
#[derive(Debug, Default)]
pub struct BatchExtraction {
    pub files: Vec<(PathBuf, Vec<QaRecord>)>,
    pub failures: Vec<FileFailure>,
}

/// Extract many files, continuing past per-file errors.
pub fn extract_batch(paths: &[PathBuf], options: &ExtractOptions) -> BatchExtraction {
    let mut batch = BatchExtraction::default();
    for path in paths {
        match extract_with(path, options) {
            Ok(records) => batch.files.push((path.clone(), records)),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping file");
                batch.failures.push(FileFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    batch
}
