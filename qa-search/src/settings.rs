//! Runtime settings.
//!
//! Layered lowest to highest: built-in defaults, a JSON settings file,
//! environment variables (after `.env` is loaded), then command-line flags.

use crate::error::{Error, Result};
use crate::extractor::ExtractOptions;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_TABLE_NAME: &str = "qa_entries";

pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_VECTORDB_PATH: &str = "VECTORDB_PATH";
pub const ENV_RAW_DATA_DIR: &str = "RAW_DATA_DIR";
pub const ENV_MODEL_CACHE_DIR: &str = "MODEL_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// fastembed model code (or `hash-<dim>`)
    pub embedding_model: String,
    pub vectordb_path: PathBuf,
    /// Directory scanned by `rebuild` and where uploads are saved
    pub raw_data_dir: PathBuf,
    pub model_cache_dir: PathBuf,
    pub table_name: String,
    pub default_top_k: usize,
    pub default_threshold: f32,
    pub paragraph_fallback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            vectordb_path: PathBuf::from("./vectordb"),
            raw_data_dir: PathBuf::from("./data/raw"),
            model_cache_dir: paths::get_model_cache_dir(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            default_top_k: 3,
            default_threshold: 0.5,
            paragraph_fallback: false,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with `config` (if given) and the process environment.
    ///
    /// An explicit `config` that cannot be read is an error. Without one, the
    /// platform settings file is used when present.
    pub async fn load(config: Option<&Path>) -> Result<Self> {
        let mut settings = match config {
            Some(path) => Self::from_file(path).await?,
            None => {
                let default_path = paths::get_settings_path();
                if fs::try_exists(&default_path).await.unwrap_or(false) {
                    Self::from_file(&default_path).await?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).await?;
        let settings = serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            self.embedding_model = model;
        }
        if let Some(path) = get(ENV_VECTORDB_PATH) {
            self.vectordb_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_RAW_DATA_DIR) {
            self.raw_data_dir = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_MODEL_CACHE_DIR) {
            self.model_cache_dir = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_model.trim().is_empty() {
            return Err(Error::Configuration("embedding_model is empty".to_string()));
        }
        if self.table_name.trim().is_empty() {
            return Err(Error::Configuration("table_name is empty".to_string()));
        }
        if self.default_top_k == 0 {
            return Err(Error::Configuration("default_top_k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.default_threshold) {
            return Err(Error::Configuration(format!(
                "default_threshold must be within [0, 1], got {}",
                self.default_threshold
            )));
        }
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            paragraph_fallback: self.paragraph_fallback,
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("failed to serialize settings: {}", e)))?;
        fs::write(path, contents).await?;
        Ok(())
    }
}
