//! Q&A pair extraction from office documents and local semantic search over
//! the extracted pairs.
//!
//! [`extractor`] turns PDF, DOCX, XLSX/XLS, CSV and TXT files into
//! [`QaRecord`]s. [`RetrievalService`] embeds their questions, stores them in
//! LanceDB and answers similarity queries.

pub mod batch;
pub mod cli;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod history;
pub mod paths;
pub mod record;
pub mod service;
pub mod settings;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use extractor::{extract, extract_with, ExtractOptions};
pub use record::{EmbeddingEntry, ExtractionPattern, QaRecord, SearchResult, SourceType};
pub use service::{BatchMatch, IngestReport, RetrievalService, StoreStats};
pub use settings::Settings;
