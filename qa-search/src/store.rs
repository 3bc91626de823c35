//! LanceDB-backed persistence for embedded Q/A records.
//!
//! One table holds every entry. Rows carry a monotonically increasing `seq`
//! so that equal-distance hits can be returned in insertion order. Entries are
//! only ever removed wholesale (reset), so the row count is also the next seq.

use crate::error::{Error, Result};
use crate::record::{EmbeddingEntry, QaRecord};
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extra candidates fetched beyond `limit` so ties at the cut-off can be seen.
const TIE_PADDING: usize = 16;

/// A stored row returned from a scan or a nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub record: QaRecord,
    pub seq: i64,
    /// Cosine distance to the query; 0 for plain scans
    pub distance: f32,
}

pub struct QaStore {
    table: Table,
    table_name: String,
    path: PathBuf,
    dimension: usize,
    next_seq: i64,
}

fn qa_table_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("question", DataType::Utf8, false),
        Field::new("answer", DataType::Utf8, false),
        Field::new("source_file", DataType::Utf8, false),
        Field::new("source_type", DataType::Utf8, false),
        Field::new("extraction_pattern", DataType::Utf8, false),
        Field::new("location", DataType::Utf8, true),
        Field::new("seq", DataType::Int64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
    ]))
}

impl QaStore {
    /// Open (or create) the table at `path`. An existing table with a
    /// different vector dimension is an error; it is never dropped silently.
    pub async fn open(path: &Path, table_name: &str, dimension: usize) -> Result<Self> {
        tokio::fs::create_dir_all(path).await?;
        let connection = connect(&path.to_string_lossy()).execute().await?;
        let expected_schema = qa_table_schema(dimension);

        let existing = connection.table_names().execute().await?;
        let table = if existing.iter().any(|name| name == table_name) {
            let table = connection.open_table(table_name).execute().await?;
            check_schema(&table, &expected_schema, dimension).await?;
            table
        } else {
            tracing::info!(table = %table_name, path = %path.display(), "creating vector table");
            create_empty_table(&connection, table_name, expected_schema).await?
        };

        let next_seq = table.count_rows(None).await? as i64;
        tracing::debug!(table = %table_name, rows = next_seq, "vector table opened");

        Ok(Self {
            table,
            table_name: table_name.to_string(),
            path: path.to_path_buf(),
            dimension,
            next_seq,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    /// Append entries in a single commit. Either all rows land or none do.
    pub async fn add(&mut self, entries: &[EmbeddingEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        let schema = qa_table_schema(self.dimension);
        let seqs: Vec<i64> = (0..entries.len() as i64).map(|i| self.next_seq + i).collect();
        let batch = entries_to_batch(schema.clone(), entries, &seqs, self.dimension)?;

        self.table
            .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .execute()
            .await?;

        self.next_seq += entries.len() as i64;
        tracing::debug!(added = entries.len(), table = %self.table_name, "entries committed");
        Ok(entries.len())
    }

    /// Nearest rows by cosine distance, ascending, ties in insertion order.
    pub async fn nearest(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<StoredRow>> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let total = self.count().await?;
        let fetch = (limit + TIE_PADDING).min(total);
        let mut rows = self.query_nearest(vector.clone(), fetch).await?;

        // Every fetched candidate ties with the cut-off row: something with a
        // lower seq may be hiding past the fetch window, so scan everything.
        let boundary_tied = rows.len() > limit
            && rows.len() == fetch
            && fetch < total
            && rows.last().map(|r| r.distance) == rows.get(limit - 1).map(|r| r.distance);
        if boundary_tied {
            rows = self.query_nearest(vector, total).await?;
        }

        rows.truncate(limit);
        Ok(rows)
    }

    async fn query_nearest(&self, vector: Vec<f32>, fetch: usize) -> Result<Vec<StoredRow>> {
        let mut stream = self
            .table
            .query()
            .nearest_to(vector)?
            .distance_type(DistanceType::Cosine)
            .limit(fetch)
            .execute()
            .await?;

        let mut rows = Vec::new();
        while let Some(batch) = stream.next().await {
            rows.extend(batch_to_rows(&batch?)?);
        }
        rows.retain(|r| r.distance.is_finite());
        rows.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        Ok(rows)
    }

    /// Every stored row in insertion order.
    pub async fn all_rows(&self) -> Result<Vec<StoredRow>> {
        let mut stream = self.table.query().execute().await?;
        let mut rows = Vec::new();
        while let Some(batch) = stream.next().await {
            rows.extend(batch_to_rows(&batch?)?);
        }
        rows.sort_by_key(|r| r.seq);
        Ok(rows)
    }

    /// Delete every entry. The table and its schema stay in place.
    pub async fn reset(&mut self) -> Result<()> {
        // Every row has seq >= 0
        self.table.delete("seq >= 0").await?;
        self.next_seq = 0;
        tracing::info!(table = %self.table_name, "vector table reset");
        Ok(())
    }
}

async fn create_empty_table(connection: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
    let batch = RecordBatch::new_empty(schema.clone());
    let table = connection
        .create_table(
            name,
            RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema),
        )
        .execute()
        .await?;
    Ok(table)
}

async fn check_schema(table: &Table, expected: &Schema, dimension: usize) -> Result<()> {
    let existing = table.schema().await?;

    let existing_dim = existing
        .field_with_name("vector")
        .ok()
        .and_then(|f| match f.data_type() {
            DataType::FixedSizeList(_, dim) => Some(*dim as usize),
            _ => None,
        });
    match existing_dim {
        Some(dim) if dim != dimension => {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: dim,
            })
        }
        None => {
            return Err(Error::Configuration(
                "existing table has no vector column".to_string(),
            ))
        }
        Some(_) => {}
    }

    let missing: Vec<&str> = expected
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|name| existing.field_with_name(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(Error::Configuration(format!(
            "existing table is missing columns: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn entries_to_batch(
    schema: Arc<Schema>,
    entries: &[EmbeddingEntry],
    seqs: &[i64],
    dimension: usize,
) -> Result<RecordBatch> {
    let ids = StringArray::from_iter_values(entries.iter().map(|e| e.id.as_str()));
    let questions = StringArray::from_iter_values(entries.iter().map(|e| e.record.question.as_str()));
    let answers = StringArray::from_iter_values(entries.iter().map(|e| e.record.answer.as_str()));
    let source_files = StringArray::from_iter_values(
        entries
            .iter()
            .map(|e| e.record.source_file.to_string_lossy().to_string()),
    );
    let source_types = StringArray::from_iter_values(entries.iter().map(|e| e.record.source_type.as_str()));
    let patterns =
        StringArray::from_iter_values(entries.iter().map(|e| e.record.extraction_pattern.as_str()));
    let locations: StringArray = entries.iter().map(|e| e.record.location.as_deref()).collect();
    let seq_array = Int64Array::from(seqs.to_vec());
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        entries
            .iter()
            .map(|e| Some(e.vector.iter().map(|v| Some(*v)).collect::<Vec<_>>())),
        dimension as i32,
    );

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(questions),
            Arc::new(answers),
            Arc::new(source_files),
            Arc::new(source_types),
            Arc::new(patterns),
            Arc::new(locations),
            Arc::new(seq_array),
            Arc::new(vectors),
        ],
    )?)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Configuration(format!("column '{}' missing or not a string", name)))
}

fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<StoredRow>> {
    let questions = string_column(batch, "question")?;
    let answers = string_column(batch, "answer")?;
    let source_files = string_column(batch, "source_file")?;
    let source_types = string_column(batch, "source_type")?;
    let patterns = string_column(batch, "extraction_pattern")?;
    let locations = string_column(batch, "location")?;
    let seqs = batch
        .column_by_name("seq")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| Error::Configuration("column 'seq' missing".to_string()))?;

    // LanceDB adds _distance to vector query results (lower = more similar)
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let source_type = source_types
            .value(i)
            .parse()
            .map_err(Error::Configuration)?;
        let extraction_pattern = patterns.value(i).parse().map_err(Error::Configuration)?;
        let mut record = QaRecord::new(
            questions.value(i),
            answers.value(i),
            source_files.value(i),
            source_type,
            extraction_pattern,
        );
        if !locations.is_null(i) {
            record = record.with_location(locations.value(i));
        }
        rows.push(StoredRow {
            record,
            seq: seqs.value(i),
            distance: distances.map(|d| d.value(i)).unwrap_or(0.0),
        });
    }
    Ok(rows)
}
