//! Extraction over the checked-in test-data files and generated Office files.

use super::fixtures::{test_data_dir, write_docx, write_xlsx, DocxPart};
use crate::error::Error;
use crate::extractor::{extract, extract_batch, ExtractOptions};
use crate::record::{ExtractionPattern, SourceType};
use std::path::PathBuf;

#[test]
fn test_extract_colon_marker_txt() {
    let path = test_data_dir().join("security_faq.txt");
    let records = extract(&path).unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].question, "Is customer data encrypted at rest?");
    assert_eq!(
        records[1].answer,
        "Full backups run nightly and are retained for 30 days.\nIncremental backups run every hour."
    );
    assert!(records
        .iter()
        .all(|r| r.extraction_pattern == ExtractionPattern::ColonMarker && r.source_type == SourceType::Txt));
}

#[test]
fn test_extract_japanese_colon_txt() {
    let records = extract(&test_data_dir().join("security_faq_ja.txt")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].question, "データセンターはどこにありますか？");
    assert_eq!(records[0].answer, "東京と大阪の国内リージョンで運用しています。");
    assert_eq!(records[1].extraction_pattern, ExtractionPattern::JapaneseColon);
}

#[test]
fn test_extract_bracket_txt() {
    let records = extract(&test_data_dir().join("bracket_faq.txt")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].question, "脆弱性診断は実施していますか？");
    assert_eq!(records[0].extraction_pattern, ExtractionPattern::JapaneseBracket);
}

#[test]
fn test_extract_csv_columns_in_row_order() {
    let records = extract(&test_data_dir().join("security_faq.csv")).unwrap();
    let questions: Vec<&str> = records.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(
        questions,
        vec![
            "Is MFA enforced for administrators?",
            "Where are audit logs stored?",
            "Is there a bug bounty program?",
        ]
    );
    assert_eq!(records[0].answer, "Yes; MFA is mandatory for every admin account.");
    assert!(records.iter().all(|r| r.extraction_pattern == ExtractionPattern::TableColumns));
}

#[test]
fn test_extract_corrupt_pdf_is_parse_error() {
    let err = extract(&test_data_dir().join("corrupt.pdf")).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "unexpected error: {:?}", err);
}

#[test]
fn test_extract_docx_paragraphs_and_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("questionnaire.docx");
    write_docx(
        &path,
        &[
            DocxPart::Paragraph("Q: Do you run penetration tests?"),
            DocxPart::Paragraph("A: Annually, by an external firm."),
            DocxPart::Table(vec![
                vec!["質問", "回答"],
                vec!["ログの保存期間は？", "一年間です。"],
                vec!["パスワードポリシーは？", "12文字以上を必須としています。"],
            ]),
        ],
    );

    let records = extract(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].question, "Do you run penetration tests?");
    assert_eq!(records[0].extraction_pattern, ExtractionPattern::ColonMarker);
    assert_eq!(records[1].question, "ログの保存期間は？");
    assert_eq!(records[2].answer, "12文字以上を必須としています。");
    assert_eq!(records[2].extraction_pattern, ExtractionPattern::TableColumns);
    assert!(records.iter().all(|r| r.source_type == SourceType::Docx));
}

#[test]
fn test_extract_xlsx_reads_every_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("faq.xlsx");
    write_xlsx(
        &path,
        &[
            (
                "Security",
                vec![
                    vec!["Question", "Answer"],
                    vec!["Is data encrypted?", "Yes."],
                    vec!["nan", "skipped"],
                ],
            ),
            (
                "Operations",
                vec![
                    vec!["Q: What is the RTO?", ""],
                    vec!["A: Four hours.", ""],
                ],
            ),
        ],
    );

    let records = extract(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].location.as_deref(), Some("Security"));
    assert_eq!(records[0].extraction_pattern, ExtractionPattern::TableColumns);
    assert_eq!(records[1].question, "What is the RTO?");
    assert_eq!(records[1].answer, "Four hours.");
    assert_eq!(records[1].source_label(), "faq.xlsx - Operations");
    assert!(records.iter().all(|r| r.source_type == SourceType::Xlsx));
}

#[test]
fn test_batch_continues_past_corrupt_pdf() {
    let data = test_data_dir();
    let paths: Vec<PathBuf> = vec![
        data.join("security_faq.txt"),
        data.join("corrupt.pdf"),
        data.join("security_faq.csv"),
    ];

    let batch = extract_batch(&paths, &ExtractOptions::default());
    assert_eq!(batch.files.len(), 2);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].path, data.join("corrupt.pdf"));
    let total: usize = batch.files.iter().map(|(_, records)| records.len()).sum();
    assert_eq!(total, 6);
}
