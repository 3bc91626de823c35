//! Command-line argument parsing and launch-time settings overrides.

use crate::batch::BatchMode;
use crate::error::Result;
use crate::settings::{Settings, ENV_EMBEDDING_MODEL, ENV_RAW_DATA_DIR, ENV_VECTORDB_PATH};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for qa-search
#[derive(Parser, Debug, Clone)]
#[command(name = "qa-search", version, about = "Extract Q&A pairs from documents and search them")]
pub struct CliArgs {
    /// JSON settings file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "FILE", env = "QA_SEARCH_CONFIG")]
    pub config: Option<PathBuf>,
    /// Embedding model id, e.g. sentence-transformers/all-MiniLM-L6-v2 or hash-384
    #[arg(long, global = true, value_name = "MODEL", env = ENV_EMBEDDING_MODEL)]
    pub model: Option<String>,
    /// Vector store directory
    #[arg(long, global = true, value_name = "PATH", env = ENV_VECTORDB_PATH)]
    pub vectordb: Option<PathBuf>,
    /// Directory scanned by `rebuild`
    #[arg(long, global = true, value_name = "DIR", env = ENV_RAW_DATA_DIR)]
    pub raw_dir: Option<PathBuf>,
    /// Turn long paragraphs into records when no Q/A marker matches
    #[arg(long, global = true)]
    pub paragraph_fallback: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Extract files (or directories) and append their records to the store
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Clear the store and re-ingest every supported file under DIR
    Rebuild { dir: Option<PathBuf> },
    /// Search stored questions
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        threshold: Option<f32>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one query per line, spreadsheet row or document paragraph
    Batch {
        /// Input file, or `-` for stdin
        input: PathBuf,
        /// Spreadsheet column holding the queries
        #[arg(long)]
        column: Option<String>,
        /// questions | document
        #[arg(long, default_value = "questions")]
        mode: BatchMode,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        threshold: Option<f32>,
        /// Write best matches as CSV instead of printing them
        #[arg(long, value_name = "CSV")]
        output: Option<PathBuf>,
    },
    /// Print the records a file would produce, as JSON, without storing them
    Extract { file: PathBuf },
    /// Delete every stored entry
    Reset,
    /// Show store statistics
    Stats,
}

impl CliArgs {
    /// Settings from file and environment, with flags applied on top.
    pub async fn resolve_settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref()).await?;
        self.apply_overrides(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.embedding_model = model.clone();
        }
        if let Some(path) = &self.vectordb {
            settings.vectordb_path = path.clone();
        }
        if let Some(dir) = &self.raw_dir {
            settings.raw_data_dir = dir.clone();
        }
        if self.paragraph_fallback {
            settings.paragraph_fallback = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_overrides() {
        let args = CliArgs::try_parse_from([
            "qa-search",
            "--model",
            "hash-16",
            "search",
            "Is data encrypted?",
            "--top-k",
            "5",
            "--threshold",
            "0.7",
        ])
        .unwrap();

        assert_eq!(args.model.as_deref(), Some("hash-16"));
        match &args.command {
            Command::Search { query, top_k, threshold, json } => {
                assert_eq!(query, "Is data encrypted?");
                assert_eq!(*top_k, Some(5));
                assert_eq!(*threshold, Some(0.7));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let mut settings = Settings::default();
        args.apply_overrides(&mut settings);
        assert_eq!(settings.embedding_model, "hash-16");
    }

    #[test]
    fn test_parse_batch_mode() {
        let args = CliArgs::try_parse_from(["qa-search", "batch", "deck.txt", "--mode", "document"]).unwrap();
        match args.command {
            Command::Batch { mode, column, .. } => {
                assert_eq!(mode, BatchMode::Document);
                assert!(column.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from(["qa-search", "rebuild", "--vectordb", "/tmp/db", "--paragraph-fallback"]).unwrap();
        let mut settings = Settings::default();
        args.apply_overrides(&mut settings);
        assert_eq!(settings.vectordb_path, PathBuf::from("/tmp/db"));
        assert!(settings.paragraph_fallback);
    }

    #[test]
    fn test_ingest_requires_paths() {
        assert!(CliArgs::try_parse_from(["qa-search", "ingest"]).is_err());
    }
}
