//! Spreadsheet and CSV reading with question/answer column detection.
//!
//! A table is read as a header row plus string rows. If one header looks like a
//! question column and another like an answer column, every row becomes a pair.
//! Otherwise the rows are flattened to lines and handed to the marker scan.

use super::decode_text;
use super::patterns::{extract_pairs, ExtractedPair};
use crate::error::{Error, Result};
use crate::record::ExtractionPattern;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

const QUESTION_KEYWORDS: &[&str] = &["question", "query", "q", "質問", "問い", "設問"];
const ANSWER_KEYWORDS: &[&str] = &["answer", "response", "a", "回答", "答え", "返答"];

/// One sheet (or the whole CSV file) as strings.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Worksheet name; `None` for CSV
    pub name: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Interpret the table as Q/A pairs.
    pub fn pairs(&self) -> Vec<ExtractedPair> {
        match find_qa_columns(&self.headers) {
            Some((q_idx, a_idx)) => self.column_pairs(q_idx, a_idx),
            None => extract_pairs(&self.flatten()),
        }
    }

    fn column_pairs(&self, q_idx: usize, a_idx: usize) -> Vec<ExtractedPair> {
        self.rows
            .iter()
            .filter_map(|row| {
                let question = row.get(q_idx).map(|s| s.trim()).unwrap_or("");
                let answer = row.get(a_idx).map(|s| s.trim()).unwrap_or("");
                if is_missing_value(question) || is_missing_value(answer) {
                    return None;
                }
                Some(ExtractedPair {
                    question: question.to_string(),
                    answer: answer.to_string(),
                    pattern: ExtractionPattern::TableColumns,
                })
            })
            .collect()
    }

    /// Header and rows as one line per row, cells joined with spaces.
    pub fn flatten(&self) -> String {
        std::iter::once(&self.headers)
            .chain(self.rows.iter())
            .map(|row| {
                row.iter()
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Locate the question and answer columns by header name.
pub fn find_qa_columns(headers: &[String]) -> Option<(usize, usize)> {
    let q_idx = find_question_column(headers)?;
    let a_idx = headers
        .iter()
        .enumerate()
        .position(|(i, h)| i != q_idx && header_matches(h, ANSWER_KEYWORDS))?;
    Some((q_idx, a_idx))
}

/// First question-like header.
pub fn find_question_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| header_matches(h, QUESTION_KEYWORDS))
}

fn header_matches(header: &str, keywords: &[&str]) -> bool {
    let normalized = header.trim().trim_start_matches('\u{feff}').to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    keywords.iter().any(|keyword| {
        if keyword.chars().count() == 1 {
            // Single letters only count as the whole header ("q", "Q.", "Q:")
            normalized.trim_end_matches(['.', ':', '：']) == *keyword
        } else {
            normalized.contains(keyword)
        }
    })
}

/// Empty cells and pandas-style `nan` placeholders carry no text.
pub(crate) fn is_missing_value(s: &str) -> bool {
    s.is_empty() || s.eq_ignore_ascii_case("nan")
}

/// Read a CSV file. Rows may have varying widths.
pub fn read_csv(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|e| Error::parse(path, format!("failed to open CSV: {}", e)))?;
    let text = decode_text(path, &bytes)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::parse(path, format!("failed to read CSV headers: {}", e)))?
        .iter()
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::parse(path, format!("failed to read CSV row: {}", e)))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(Table {
        name: None,
        headers,
        rows,
    })
}

/// Read every worksheet of an XLSX/XLS workbook. Empty sheets are skipped.
pub fn read_workbook(path: &Path) -> Result<Vec<Table>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::parse(path, format!("failed to open workbook: {}", e)))?;

    let mut tables = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| Error::parse(path, format!("failed to read sheet '{}': {}", sheet_name, e)))?;

        let mut rows_iter = range.rows();
        let Some(header_row) = rows_iter.next() else {
            tracing::debug!(sheet = %sheet_name, "skipping empty worksheet");
            continue;
        };

        tables.push(Table {
            name: Some(sheet_name),
            headers: header_row.iter().map(excel_cell_to_string).collect(),
            rows: rows_iter
                .map(|row| row.iter().map(excel_cell_to_string).collect())
                .collect(),
        });
    }

    Ok(tables)
}

/// Convert an Excel cell to a string value.
fn excel_cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        // Formula errors carry no usable text
        Data::Error(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_qa_columns_english_headers() {
        let headers = strings(&["ID", "Question", "Answer", "Owner"]);
        assert_eq!(find_qa_columns(&headers), Some((1, 2)));
    }

    #[test]
    fn test_find_qa_columns_japanese_headers() {
        let headers = strings(&["番号", "質問内容", "回答"]);
        assert_eq!(find_qa_columns(&headers), Some((1, 2)));
    }

    #[test]
    fn test_single_letter_headers_must_match_whole() {
        assert_eq!(find_qa_columns(&strings(&["Q", "A"])), Some((0, 1)));
        assert_eq!(find_qa_columns(&strings(&["Q.", "A:"])), Some((0, 1)));
        // "Category" and "Data" contain 'a' but are not answer columns
        assert_eq!(find_qa_columns(&strings(&["Query", "Category", "Data"])), None);
    }

    #[test]
    fn test_find_qa_columns_requires_both() {
        assert_eq!(find_qa_columns(&strings(&["Question", "Notes"])), None);
        assert_eq!(find_qa_columns(&strings(&[])), None);
    }

    #[test]
    fn test_column_pairs_skip_missing_cells_and_keep_order() {
        let table = Table {
            name: None,
            headers: strings(&["question", "answer"]),
            rows: vec![
                strings(&["First?", "One"]),
                strings(&["", "orphan"]),
                strings(&["Third?", "nan"]),
                strings(&["Fourth?"]),
                strings(&["Fifth?", "Five"]),
            ],
        };
        let pairs = table.pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "First?");
        assert_eq!(pairs[1].answer, "Five");
        assert!(pairs.iter().all(|p| p.pattern == ExtractionPattern::TableColumns));
    }

    #[test]
    fn test_rows_without_qa_columns_fall_back_to_marker_scan() {
        let table = Table {
            name: Some("Sheet1".to_string()),
            headers: strings(&["Q: Is there an SLA?", ""]),
            rows: vec![strings(&["A: 99.9% monthly.", ""])],
        };
        let pairs = table.pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "Is there an SLA?");
        assert_eq!(pairs[0].answer, "99.9% monthly.");
        assert_eq!(pairs[0].pattern, ExtractionPattern::ColonMarker);
    }

    #[test]
    fn test_excel_cell_to_string() {
        assert_eq!(excel_cell_to_string(&Data::Empty), "");
        assert_eq!(excel_cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(excel_cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(excel_cell_to_string(&Data::Int(7)), "7");
        assert_eq!(excel_cell_to_string(&Data::String("x".into())), "x");
    }

    #[test]
    fn test_read_csv_with_flexible_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.csv");
        std::fs::write(&path, "\u{feff}question,answer\nA?,yes\nB?,no,extra\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.headers, strings(&["question", "answer"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.pairs().len(), 2);
    }

    #[test]
    fn test_read_csv_decodes_shift_jis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sjis.csv");
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("質問,回答\n暗号化していますか？,はい\n");
        std::fs::write(&path, &bytes).unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.headers, strings(&["質問", "回答"]));
        let pairs = table.pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "暗号化していますか？");
        assert_eq!(pairs[0].answer, "はい");
    }

    #[test]
    fn test_read_csv_rejects_undecodable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.csv");
        std::fs::write(&path, [0xff, 0xfe, 0xfd, b',', b'a', b'\n', b'x', b',', b'y', b'\n']).unwrap();

        assert!(matches!(read_csv(&path), Err(Error::Parse { .. })));
    }
}
