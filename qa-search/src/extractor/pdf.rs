//! PDF text flattening.
//!
//! pdf-extract handles font encodings better, but it panics on some malformed
//! files. Panics are caught and the lopdf content-stream walk is used instead.

use crate::error::{Error, Result};
use std::path::Path;

/// Extract the text of every page, in page order, separated by newlines.
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let pages_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    let failure = match pages_result {
        Ok(Ok(pages)) => {
            let mut text = String::new();
            for page in pages {
                text.push_str(&page);
                text.push('\n');
            }
            return Ok(text);
        }
        Ok(Err(e)) => e.to_string(),
        Err(panic_payload) => {
            if let Some(s) = panic_payload.downcast_ref::<&str>() {
                format!("panic: {}", s)
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                format!("panic: {}", s)
            } else {
                "panic: unknown".to_string()
            }
        }
    };

    tracing::warn!(
        file = %path.display(),
        error = %failure,
        "pdf-extract failed, trying lopdf fallback"
    );

    match extract_pdf_text_via_lopdf(path) {
        Ok(text) => {
            tracing::debug!(chars = text.len(), "lopdf fallback succeeded");
            Ok(text)
        }
        Err(fallback_err) => Err(Error::parse(
            path,
            format!("unreadable PDF ({}; fallback: {})", failure, fallback_err),
        )),
    }
}

/// Less accurate for complex fonts but more tolerant of malformed PDFs.
fn extract_pdf_text_via_lopdf(path: &Path) -> std::result::Result<String, lopdf::Error> {
    use lopdf::{Document, Object};

    let doc = Document::load(path)?;
    let mut all_text = String::new();

    for (_page_num, page_id) in doc.get_pages() {
        let Ok(content) = doc.get_page_content(page_id) else {
            continue;
        };
        let operations = lopdf::content::Content::decode(&content)
            .map(|c| c.operations)
            .unwrap_or_default();

        for op in operations {
            match op.operator.as_str() {
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        all_text.push_str(&decode_text_bytes(bytes));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(arr)) = op.operands.first() {
                        for item in arr {
                            if let Object::String(bytes, _) = item {
                                all_text.push_str(&decode_text_bytes(bytes));
                            }
                        }
                    }
                }
                "Td" | "TD" | "T*" | "'" | "\"" => {
                    if !all_text.ends_with('\n') && !all_text.ends_with(' ') {
                        all_text.push(' ');
                    }
                }
                "ET" => {
                    if !all_text.ends_with('\n') {
                        all_text.push('\n');
                    }
                }
                _ => {}
            }
        }
        all_text.push('\n');
    }

    Ok(all_text)
}

/// UTF-16BE when the string carries a BOM, else UTF-8, else Latin-1.
fn decode_text_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    String::from_utf8(bytes.to_vec()).unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect())
}
