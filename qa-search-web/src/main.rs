mod server;
mod ui;

use anyhow::Context;
use clap::Parser;
use qa_search::settings::{ENV_EMBEDDING_MODEL, ENV_RAW_DATA_DIR, ENV_VECTORDB_PATH};
use qa_search::{RetrievalService, Settings};
use server::{serve_ui, AppState, DEFAULT_HOST, DEFAULT_PORT};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(name = "qa-search-web", version, about = "Web UI for searching extracted Q&A pairs")]
struct WebArgs {
    /// Host interface for the web UI
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Port for the web UI (0 picks a free port)
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Do not open the UI in a browser
    #[arg(long)]
    no_open: bool,
    /// JSON settings file (defaults to the platform config dir)
    #[arg(long, value_name = "FILE", env = "QA_SEARCH_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "MODEL", env = ENV_EMBEDDING_MODEL)]
    model: Option<String>,
    #[arg(long, value_name = "PATH", env = ENV_VECTORDB_PATH)]
    vectordb: Option<PathBuf>,
    /// Rebuild source and upload destination
    #[arg(long, value_name = "DIR", env = ENV_RAW_DATA_DIR)]
    raw_dir: Option<PathBuf>,
    #[arg(long)]
    paragraph_fallback: bool,
}

impl WebArgs {
    async fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref()).await?;
        if let Some(model) = &self.model {
            settings.embedding_model = model.clone();
        }
        if let Some(path) = &self.vectordb {
            settings.vectordb_path = path.clone();
        }
        if let Some(dir) = &self.raw_dir {
            settings.raw_data_dir = dir.clone();
        }
        settings.paragraph_fallback |= self.paragraph_fallback;
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = WebArgs::parse();
    let settings = args.settings().await?;
    tracing::info!(
        host = %args.host,
        port = args.port,
        model = %settings.embedding_model,
        store = %settings.vectordb_path.display(),
        "starting qa-search-web"
    );

    let service = RetrievalService::open(&settings)
        .await
        .context("failed to open the retrieval service")?;
    let state = Arc::new(AppState::new(service, settings));

    serve_ui(&args.host, args.port, state, !args.no_open).await
}
