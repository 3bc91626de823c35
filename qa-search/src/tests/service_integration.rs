//! End-to-end retrieval over a scratch LanceDB directory.

use super::fixtures::{test_data_dir, test_embedder, test_settings, TEST_DIMENSION};
use crate::error::Error;
use crate::record::{ExtractionPattern, QaRecord, SourceType};
use crate::service::RetrievalService;
use std::path::{Path, PathBuf};

async fn open_service(dir: &Path) -> RetrievalService {
    RetrievalService::with_embedder(&test_settings(dir), test_embedder())
        .await
        .unwrap()
}

/// Copy the text and CSV fixtures into a fresh raw-data directory.
fn seed_raw_dir(dir: &Path) -> PathBuf {
    let raw = dir.join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    for name in ["security_faq.txt", "security_faq_ja.txt", "security_faq.csv"] {
        std::fs::copy(test_data_dir().join(name), raw.join(name)).unwrap();
    }
    raw
}

fn record(question: &str, answer: &str) -> QaRecord {
    QaRecord::new(
        question,
        answer,
        "manual.txt",
        SourceType::Txt,
        ExtractionPattern::ColonMarker,
    )
}

#[tokio::test]
async fn test_search_on_empty_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(dir.path()).await;

    let err = service.search("Is data encrypted?", 3, 0.0).await.unwrap_err();
    assert!(matches!(err, Error::EmptyStore));

    let err = service
        .batch_search(&["Is data encrypted?".to_string()], 1, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyStore));
}

#[tokio::test]
async fn test_rebuild_then_exact_question_is_top_result() {
    let dir = tempfile::tempdir().unwrap();
    let raw = seed_raw_dir(dir.path());
    let mut service = open_service(dir.path()).await;

    let report = service.rebuild(&raw).await.unwrap();
    assert_eq!(report.files_processed, 3);
    assert_eq!(report.records_added, 8);
    assert!(report.failures.is_empty());

    let results = service
        .search("How often are backups taken?", 3, 0.0)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].record.question, "How often are backups taken?");
    assert!(results[0].similarity_score >= 0.99);
    assert!(results[0].record.answer.contains("Incremental backups"));
}

#[tokio::test]
async fn test_results_sorted_and_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let raw = seed_raw_dir(dir.path());
    let mut service = open_service(dir.path()).await;
    service.rebuild(&raw).await.unwrap();

    let results = service.search("customer data encryption", 8, 0.0).await.unwrap();
    assert!(results.len() <= 8);
    for pair in results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
    assert!(results
        .iter()
        .all(|r| (0.0..=1.0).contains(&r.similarity_score)));

    let threshold = 0.3;
    let filtered = service
        .search("customer data encryption", 8, threshold)
        .await
        .unwrap();
    assert!(filtered.iter().all(|r| r.similarity_score >= threshold));
    assert!(filtered.len() <= results.len());
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path()).await;
    service
        .add(vec![record("Is MFA required?", "Yes.")])
        .await
        .unwrap();

    assert!(matches!(service.search("   ", 3, 0.5).await, Err(Error::InvalidQuery(_))));
    assert!(matches!(service.search("MFA", 0, 0.5).await, Err(Error::InvalidQuery(_))));
    assert!(matches!(service.search("MFA", 3, 1.5).await, Err(Error::InvalidQuery(_))));
}

#[tokio::test]
async fn test_entries_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut service = open_service(dir.path()).await;
        let added = service
            .add(vec![
                record("Is MFA required?", "Yes, for all staff."),
                record("Who owns incident response?", "The security operations team."),
            ])
            .await
            .unwrap();
        assert_eq!(added, 2);
    }

    let service = open_service(dir.path()).await;
    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.dimension, TEST_DIMENSION);

    let results = service.search("Who owns incident response?", 1, 0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.answer, "The security operations team.");

    let records = service.records().await.unwrap();
    assert_eq!(records[0].question, "Is MFA required?");
    assert_eq!(records[1].question, "Who owns incident response?");
}

#[tokio::test]
async fn test_ingest_reports_corrupt_pdf_and_keeps_valid_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path()).await;
    let data = test_data_dir();

    let report = service
        .ingest_files(&[
            data.join("corrupt.pdf"),
            data.join("security_faq.txt"),
            data.join("bracket_faq.txt"),
        ])
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, data.join("corrupt.pdf"));
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.records_added, 4);
    assert_eq!(service.stats().await.unwrap().total_entries, 4);
}

#[tokio::test]
async fn test_rebuild_replaces_previous_entries() {
    let dir = tempfile::tempdir().unwrap();
    let raw = seed_raw_dir(dir.path());
    let mut service = open_service(dir.path()).await;

    service
        .add(vec![record("An entry that should disappear?", "Gone after rebuild.")])
        .await
        .unwrap();
    service.rebuild(&raw).await.unwrap();

    let records = service.records().await.unwrap();
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.question != "An entry that should disappear?"));

    // Rebuilding twice does not duplicate anything
    service.rebuild(&raw).await.unwrap();
    assert_eq!(service.stats().await.unwrap().total_entries, 8);
}

#[tokio::test]
async fn test_rebuild_of_missing_directory_keeps_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path()).await;
    service
        .add(vec![record("Is MFA required?", "Yes.")])
        .await
        .unwrap();

    assert!(service.rebuild(&dir.path().join("does-not-exist")).await.is_err());
    assert_eq!(service.stats().await.unwrap().total_entries, 1);
}

#[tokio::test]
async fn test_reset_empties_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path()).await;
    service
        .add(vec![record("Is MFA required?", "Yes.")])
        .await
        .unwrap();

    service.reset().await.unwrap();
    assert_eq!(service.stats().await.unwrap().total_entries, 0);
    assert!(matches!(
        service.search("Is MFA required?", 1, 0.0).await,
        Err(Error::EmptyStore)
    ));

    service
        .add(vec![record("Is SSO supported?", "Yes.")])
        .await
        .unwrap();
    assert_eq!(service.records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_search_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path()).await;
    service
        .add(vec![
            record("Is MFA required?", "Yes."),
            record("Where are audit logs stored?", "In a write-once bucket."),
        ])
        .await
        .unwrap();

    let queries = vec![
        "Where are audit logs stored?".to_string(),
        "".to_string(),
        "Is MFA required?".to_string(),
    ];
    let matches = service.batch_search(&queries, 1, 0.0).await.unwrap();

    assert_eq!(matches.len(), 3);
    assert_eq!(
        matches[0].best().unwrap().record.answer,
        "In a write-once bucket."
    );
    assert!(matches[1].results.is_empty());
    assert_eq!(matches[2].query, "Is MFA required?");
    assert_eq!(matches[2].best().unwrap().record.answer, "Yes.");
}

#[tokio::test]
async fn test_reopen_with_other_dimension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut service = open_service(dir.path()).await;
        service
            .add(vec![record("Is MFA required?", "Yes.")])
            .await
            .unwrap();
    }

    let mut settings = test_settings(dir.path());
    settings.embedding_model = "hash-32".to_string();
    let embedder = crate::embedding::load_embedder(&settings.embedding_model, &settings.model_cache_dir)
        .await
        .unwrap();
    let err = RetrievalService::with_embedder(&settings, embedder)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 32,
            actual: TEST_DIMENSION
        }
    ));
}
