//! The retrieval service: embedding model plus vector store behind one handle.
//!
//! Construct it explicitly with [`RetrievalService::open`] and pass it around;
//! there is no global instance. Mutating calls take `&mut self`, so callers
//! that share it (the web UI) put it behind a mutex.

use crate::embedding::{embed_texts, load_embedder, normalize, Embedder};
use crate::error::{Error, Result};
use crate::extractor::{self, ExtractOptions, FileFailure};
use crate::record::{EmbeddingEntry, QaRecord, SearchResult};
use crate::settings::Settings;
use crate::store::{QaStore, StoredRow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Records contributed by one file during ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub records: usize,
}

/// Outcome of `rebuild` or `ingest_files`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Files that extracted without error (including ones with zero records)
    pub files_processed: usize,
    pub records_added: usize,
    pub failures: Vec<FileFailure>,
    pub per_file: Vec<FileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_entries: usize,
    pub table_name: String,
    pub store_path: PathBuf,
    pub model: String,
    pub dimension: usize,
}

/// Search results for one input of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchMatch {
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl BatchMatch {
    pub fn best(&self) -> Option<&SearchResult> {
        self.results.first()
    }
}

pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    store: QaStore,
    extract_options: ExtractOptions,
}

impl RetrievalService {
    /// Load the configured embedding model and open the store.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let embedder = load_embedder(&settings.embedding_model, &settings.model_cache_dir).await?;
        Self::with_embedder(settings, embedder).await
    }

    /// Open the store using an already constructed embedder.
    pub async fn with_embedder(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let store = QaStore::open(
            &settings.vectordb_path,
            &settings.table_name,
            embedder.dimension(),
        )
        .await?;
        tracing::info!(
            model = %embedder.model_id(),
            store = %settings.vectordb_path.display(),
            "retrieval service ready"
        );
        Ok(Self {
            embedder,
            store,
            extract_options: settings.extract_options(),
        })
    }

    /// Embed each record's question and persist everything in one commit.
    pub async fn add(&mut self, records: Vec<QaRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let questions: Vec<String> = records.iter().map(|r| r.question.clone()).collect();
        let vectors = self.embed(questions).await?;

        let entries: Vec<EmbeddingEntry> = records
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| EmbeddingEntry {
                id: Uuid::new_v4().to_string(),
                vector,
                record,
            })
            .collect();

        let added = self.store.add(&entries).await?;
        tracing::info!(added, "records added to store");
        Ok(added)
    }

    /// Up to `top_k` results with `similarity_score >= threshold`, best first.
    pub async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        validate_query(query, top_k, threshold)?;
        self.ensure_not_empty().await?;

        let mut vectors = self.embed(vec![query.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("model returned no vector".to_string()))?;
        self.search_vector(vector, top_k, threshold).await
    }

    /// Run several queries; blank inputs get no results rather than an error.
    pub async fn batch_search(
        &self,
        queries: &[String],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<BatchMatch>> {
        validate_query("batch", top_k, threshold)?;
        self.ensure_not_empty().await?;

        let non_blank: Vec<String> = queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .cloned()
            .collect();
        let mut vectors = self.embed(non_blank).await?.into_iter();

        let mut matches = Vec::with_capacity(queries.len());
        for query in queries {
            let results = if query.trim().is_empty() {
                Vec::new()
            } else {
                let vector = vectors
                    .next()
                    .ok_or_else(|| Error::Embedding("model returned too few vectors".to_string()))?;
                self.search_vector(vector, top_k, threshold).await?
            };
            matches.push(BatchMatch {
                query: query.clone(),
                results,
            });
        }
        tracing::info!(queries = queries.len(), "batch search finished");
        Ok(matches)
    }

    /// Replace the store contents with everything extracted from `directory`.
    pub async fn rebuild(&mut self, directory: &Path) -> Result<IngestReport> {
        let files = extractor::collect_files_recursive(directory)?;
        tracing::info!(dir = %directory.display(), files = files.len(), "rebuilding store");

        let extraction = self.extract(files).await?;
        self.store.reset().await?;
        self.commit(extraction).await
    }

    /// Extract and append the given files, continuing past per-file failures.
    pub async fn ingest_files(&mut self, paths: &[PathBuf]) -> Result<IngestReport> {
        let extraction = self.extract(paths.to_vec()).await?;
        self.commit(extraction).await
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.store.reset().await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            total_entries: self.store.count().await?,
            table_name: self.store.table_name().to_string(),
            store_path: self.store.path().to_path_buf(),
            model: self.embedder.model_id().to_string(),
            dimension: self.embedder.dimension(),
        })
    }

    /// Every stored record in insertion order.
    pub async fn records(&self) -> Result<Vec<QaRecord>> {
        Ok(self
            .store
            .all_rows()
            .await?
            .into_iter()
            .map(|row| row.record)
            .collect())
    }

    async fn extract(&self, files: Vec<PathBuf>) -> Result<extractor::BatchExtraction> {
        let options = self.extract_options;
        tokio::task::spawn_blocking(move || extractor::extract_batch(&files, &options))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("extraction task failed: {}", e))))
    }

    async fn commit(&mut self, extraction: extractor::BatchExtraction) -> Result<IngestReport> {
        let mut report = IngestReport {
            files_processed: extraction.files.len(),
            failures: extraction.failures,
            ..IngestReport::default()
        };

        let mut records = Vec::new();
        for (path, file_records) in extraction.files {
            report.per_file.push(FileSummary {
                path,
                records: file_records.len(),
            });
            records.extend(file_records);
        }

        report.records_added = self.add(records).await?;
        tracing::info!(
            files = report.files_processed,
            records = report.records_added,
            failures = report.failures.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ensure_not_empty(&self) -> Result<()> {
        if self.store.count().await? == 0 {
            return Err(Error::EmptyStore);
        }
        Ok(())
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let mut vectors = embed_texts(Arc::clone(&self.embedder), texts).await?;
        if vectors.len() != expected {
            return Err(Error::Embedding(format!(
                "expected {} vectors, model returned {}",
                expected,
                vectors.len()
            )));
        }
        let dimension = self.embedder.dimension();
        for vector in vectors.iter_mut() {
            if vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            normalize(vector);
        }
        Ok(vectors)
    }

    async fn search_vector(&self, vector: Vec<f32>, top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        let rows = self.store.nearest(vector, top_k).await?;
        Ok(rows
            .into_iter()
            .map(row_to_result)
            .filter(|r| r.similarity_score >= threshold)
            .collect())
    }
}

fn row_to_result(row: StoredRow) -> SearchResult {
    SearchResult {
        record: row.record,
        similarity_score: similarity_from_distance(row.distance),
    }
}

/// Cosine distance to a similarity in [0, 1].
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

fn validate_query(query: &str, top_k: usize, threshold: f32) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidQuery("query is empty".to_string()));
    }
    if top_k == 0 {
        return Err(Error::InvalidQuery("top_k must be at least 1".to_string()));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidQuery(format!(
            "similarity threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}
