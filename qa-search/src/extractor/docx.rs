//! DOCX body reading: paragraphs and tables in document order.

use super::tabular::Table;
use crate::error::{Error, Result};
use std::io::Read;
use std::path::Path;

/// A top-level piece of the document body.
#[derive(Debug, Clone)]
pub enum DocxBlock {
    /// A run of consecutive paragraphs, one line each
    Text(String),
    /// A table; the first row is taken as the header row
    Table(Table),
}

/// Read `word/document.xml` from the archive and split it into blocks.
pub fn read_docx(path: &Path) -> Result<Vec<DocxBlock>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::parse(path, format!("failed to open DOCX: {}", e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::parse(path, format!("invalid DOCX archive: {}", e)))?;

    let mut doc_xml = archive
        .by_name("word/document.xml")
        .map_err(|_| Error::parse(path, "no word/document.xml in archive"))?;

    let mut xml_content = String::new();
    doc_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| Error::parse(path, format!("failed to read document.xml: {}", e)))?;

    Ok(parse_document_xml(&xml_content))
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl TableBuilder {
    fn into_table(self) -> Table {
        let mut rows = self.rows.into_iter();
        Table {
            name: None,
            headers: rows.next().unwrap_or_default(),
            rows: rows.collect(),
        }
    }
}

/// Walk the WordprocessingML tags. Only `w:t` content is kept; `w:p`, `w:br`
/// and `w:tab` become whitespace; `w:tbl`/`w:tr`/`w:tc` build tables.
///
/// `w:tab` also declares tab stops under `w:pPr`; only a tab inside a run is text.
pub fn parse_document_xml(xml: &str) -> Vec<DocxBlock> {
    let mut blocks = Vec::new();
    let mut text = String::new();
    let mut tables: Vec<TableBuilder> = Vec::new();
    let mut in_text = false;
    let mut in_run = false;
    let mut run = String::new();
    let mut chars = xml.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            if in_text {
                run.push(c);
            }
            continue;
        }

        let mut tag = String::new();
        for tc in chars.by_ref() {
            if tc == '>' {
                break;
            }
            tag.push(tc);
        }
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("");

        // Flush text collected inside the previous w:t
        if in_text && !run.is_empty() {
            let decoded = unescape_xml(&run);
            match tables.last_mut() {
                Some(table) => table.cell.push_str(&decoded),
                None => text.push_str(&decoded),
            }
            run.clear();
        }

        let target = |tables: &mut Vec<TableBuilder>, text: &mut String, s: &str| match tables.last_mut() {
            Some(table) => table.cell.push_str(s),
            None => text.push_str(s),
        };

        match name {
            "w:t" => in_text = !self_closing,
            "/w:t" => in_text = false,
            "w:r" => in_run = !self_closing,
            "/w:r" => in_run = false,
            "w:tab" if in_run => target(&mut tables, &mut text, "\t"),
            "w:br" | "w:cr" => target(&mut tables, &mut text, "\n"),
            "/w:p" => target(&mut tables, &mut text, "\n"),
            "w:tbl" if !self_closing => {
                if tables.is_empty() && !text.trim().is_empty() {
                    blocks.push(DocxBlock::Text(std::mem::take(&mut text)));
                }
                text.clear();
                tables.push(TableBuilder::default());
            }
            "/w:tbl" => {
                if let Some(finished) = tables.pop() {
                    let table = finished.into_table();
                    match tables.last_mut() {
                        // Nested tables are folded into the enclosing cell
                        Some(parent) => parent.cell.push_str(&table.flatten()),
                        None => blocks.push(DocxBlock::Table(table)),
                    }
                }
            }
            "/w:tc" => {
                if let Some(table) = tables.last_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            "/w:tr" => {
                if let Some(table) = tables.last_mut() {
                    let row = std::mem::take(&mut table.row);
                    if row.iter().any(|c| !c.is_empty()) {
                        table.rows.push(row);
                    }
                }
            }
            _ => {}
        }
    }

    if !text.trim().is_empty() {
        blocks.push(DocxBlock::Text(text));
    }
    blocks
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
