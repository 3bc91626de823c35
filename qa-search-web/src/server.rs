//! HTTP server for the qa-search web UI.
//!
//! - Single and batch search against the shared retrieval service
//! - Search history with CSV download
//! - Upload/ingest, rebuild from the raw data directory, reset and stats

use crate::ui::UI_HTML;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use qa_search::batch::{self, BatchMode};
use qa_search::extractor::{is_supported_file, FileFailure};
use qa_search::history::{write_batch_csv, QueryMode, SearchHistory};
use qa_search::{BatchMatch, Error, IngestReport, RetrievalService, SearchResult, Settings, StoreStats};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 43031;

/// Uploaded documents can be large scanned PDFs.
const UPLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

// -----------------------------------------------------------------------------
// State
// -----------------------------------------------------------------------------

pub struct AppState {
    service: Mutex<RetrievalService>,
    history: RwLock<SearchHistory>,
    last_batch: RwLock<Vec<BatchMatch>>,
    settings: Settings,
}

impl AppState {
    pub fn new(service: RetrievalService, settings: Settings) -> Self {
        Self {
            service: Mutex::new(service),
            history: RwLock::new(SearchHistory::new()),
            last_batch: RwLock::new(Vec::new()),
            settings,
        }
    }
}

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidQuery(_) | Error::UnsupportedFormat { .. } | Error::Parse { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::EmptyStore => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let status = status_for(&error);
        if status.is_server_error() {
            tracing::error!(error = %error, "request failed");
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error).into()
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::bad_request(format!("invalid upload: {}", error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// -----------------------------------------------------------------------------
// Request / response models
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Batch input as pasted text (split by `mode`) or an explicit query list.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub queries: Option<Vec<String>>,
    #[serde(default)]
    pub mode: BatchMode,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub matches: Vec<BatchMatch>,
    pub matched: usize,
}

// -----------------------------------------------------------------------------
// Server
// -----------------------------------------------------------------------------

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ui_handler))
        .route("/api/search", post(search_handler))
        .route("/api/batch", post(batch_handler))
        .route("/api/batch/upload", post(batch_upload_handler))
        .route("/api/batch/last.csv", get(last_batch_csv_handler))
        .route("/api/history", get(history_handler))
        .route("/api/history.csv", get(history_csv_handler))
        .route("/api/history/clear", post(clear_history_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/rebuild", post(rebuild_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/stats", get(stats_handler))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .with_state(state)
}

pub async fn serve_ui(host: &str, port: u16, state: Arc<AppState>, open_ui: bool) -> anyhow::Result<()> {
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("web UI listening on http://{} (open_ui={})", actual_addr, open_ui);

    if open_ui {
        if let Err(e) = open::that(format!("http://{}", actual_addr)) {
            tracing::warn!(error = %e, "could not open a browser");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn ui_handler() -> Html<&'static str> {
    Html(UI_HTML)
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let top_k = request.top_k.unwrap_or(state.settings.default_top_k);
    let threshold = request.threshold.unwrap_or(state.settings.default_threshold);
    tracing::info!(top_k, threshold, "/api/search");

    let results = state
        .service
        .lock()
        .await
        .search(&request.query, top_k, threshold)
        .await?;

    state
        .history
        .write()
        .await
        .record(&request.query, QueryMode::Single, &results);

    Ok(Json(SearchResponse {
        query: request.query,
        results,
    }))
}

pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let queries = match (request.queries, request.text) {
        (Some(queries), _) => queries,
        (None, Some(text)) => batch::queries_from_text(&text, request.mode),
        (None, None) => return Err(ApiError::bad_request("provide either `text` or `queries`")),
    };
    run_batch(&state, queries, request.mode, request.top_k, request.threshold).await
}

/// Multipart batch input: a `file` field plus optional `mode`, `column`,
/// `top_k` and `threshold` text fields.
pub async fn batch_upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<BatchResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut mode = BatchMode::default();
    let mut column: Option<String> = None;
    let mut top_k = None;
    let mut threshold = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.txt").to_string();
                upload = Some((file_name, field.bytes().await?.to_vec()));
            }
            "mode" => mode = field.text().await?.parse().map_err(ApiError::bad_request)?,
            "column" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    column = Some(text);
                }
            }
            "top_k" => top_k = Some(parse_field(&name, &field.text().await?)?),
            "threshold" => threshold = Some(parse_field(&name, &field.text().await?)?),
            _ => {}
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("missing `file` field"))?;
    let file_name = sanitize_file_name(&file_name)
        .ok_or_else(|| ApiError::bad_request(format!("invalid file name '{}'", file_name)))?;

    let scratch = std::env::temp_dir().join(format!(
        "qa-search-batch-{}-{}-{}",
        std::process::id(),
        chrono::Local::now().timestamp_nanos_opt().unwrap_or_default(),
        file_name
    ));
    tokio::fs::write(&scratch, &bytes).await?;

    let path = scratch.clone();
    let loaded = tokio::task::spawn_blocking(move || batch::load_queries(&path, mode, column.as_deref()))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("query loading task failed: {}", e))));
    if let Err(e) = tokio::fs::remove_file(&scratch).await {
        tracing::warn!(file = %scratch.display(), error = %e, "could not remove batch upload");
    }
    let queries = loaded??;

    run_batch(&state, queries, mode, top_k, threshold).await
}

async fn run_batch(
    state: &AppState,
    queries: Vec<String>,
    mode: BatchMode,
    top_k: Option<usize>,
    threshold: Option<f32>,
) -> ApiResult<Json<BatchResponse>> {
    if queries.iter().all(|q| q.trim().is_empty()) {
        return Err(ApiError::bad_request("no queries found in the input"));
    }
    let top_k = top_k.unwrap_or(1);
    let threshold = threshold.unwrap_or(state.settings.default_threshold);
    tracing::info!(queries = queries.len(), ?mode, "/api/batch");

    let matches = state
        .service
        .lock()
        .await
        .batch_search(&queries, top_k, threshold)
        .await?;

    let history_mode = match mode {
        BatchMode::Questions => QueryMode::QuestionList,
        BatchMode::Document => QueryMode::DocumentCheck,
    };
    state.history.write().await.record_batch(&matches, history_mode);
    *state.last_batch.write().await = matches.clone();

    let matched = matches.iter().filter(|m| m.best().is_some()).count();
    Ok(Json(BatchResponse { matches, matched }))
}

async fn last_batch_csv_handler(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let mut buffer = Vec::new();
    write_batch_csv(&mut buffer, &state.last_batch.read().await)?;
    Ok(csv_download("batch_results.csv", buffer))
}

pub async fn history_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let history = state.history.read().await;
    Json(json!({ "entries": history.entries(), "count": history.len() }))
}

async fn history_csv_handler(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let bytes = state.history.read().await.to_csv_bytes()?;
    Ok(csv_download("search_history.csv", bytes))
}

pub async fn clear_history_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.history.write().await.clear();
    tracing::info!("search history cleared");
    Json(json!({ "status": "cleared" }))
}

/// Save uploaded documents into the raw data directory and ingest them.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<IngestReport>> {
    let raw_dir = state.settings.raw_data_dir.clone();
    tokio::fs::create_dir_all(&raw_dir).await?;

    let mut saved = Vec::new();
    let mut rejected = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        match save_upload(&raw_dir, &original, &data).await {
            Ok(path) => saved.push(path),
            Err(failure) => rejected.push(failure),
        }
    }
    tracing::info!(saved = saved.len(), rejected = rejected.len(), "/api/upload");

    let mut report = state.service.lock().await.ingest_files(&saved).await?;
    report.failures.extend(rejected);
    Ok(Json(report))
}

pub async fn rebuild_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<IngestReport>> {
    tracing::info!(dir = %state.settings.raw_data_dir.display(), "/api/rebuild");
    let report = state
        .service
        .lock()
        .await
        .rebuild(&state.settings.raw_data_dir)
        .await?;
    Ok(Json(report))
}

pub async fn reset_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    state.service.lock().await.reset().await?;
    tracing::info!("/api/reset: store cleared");
    Ok(Json(json!({ "status": "cleared" })))
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<StoreStats>> {
    Ok(Json(state.service.lock().await.stats().await?))
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn csv_download(file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> ApiResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid value for `{}`: '{}'", name, value)))
}

/// Final path component of a client-supplied name; `None` if nothing usable remains.
fn sanitize_file_name(name: &str) -> Option<String> {
    // Browsers on Windows may send the full client path
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." || base.starts_with('.') {
        return None;
    }
    Some(base.to_string())
}

async fn save_upload(dir: &Path, original: &str, data: &[u8]) -> Result<PathBuf, FileFailure> {
    let Some(name) = sanitize_file_name(original) else {
        return Err(FileFailure {
            path: PathBuf::from(original),
            error: "invalid file name".to_string(),
        });
    };
    let path = dir.join(name);
    if !is_supported_file(&path) {
        return Err(FileFailure {
            error: Error::UnsupportedFormat { path: path.clone() }.to_string(),
            path,
        });
    }
    tokio::fs::write(&path, data).await.map_err(|e| FileFailure {
        path: path.clone(),
        error: e.to_string(),
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_search::embedding::HashEmbedder;
    use qa_search::{ExtractionPattern, QaRecord, SourceType};

    async fn test_state(dir: &Path) -> Arc<AppState> {
        let settings = Settings {
            embedding_model: "hash-32".to_string(),
            vectordb_path: dir.join("vectordb"),
            raw_data_dir: dir.join("raw"),
            model_cache_dir: dir.join("models"),
            ..Settings::default()
        };
        let service = RetrievalService::with_embedder(&settings, Arc::new(HashEmbedder::new(32)))
            .await
            .unwrap();
        Arc::new(AppState::new(service, settings))
    }

    async fn seed(state: &AppState) {
        let records = vec![
            QaRecord::new("Is MFA required?", "Yes, for every account.", "faq.txt", SourceType::Txt, ExtractionPattern::ColonMarker),
            QaRecord::new("Where are backups stored?", "In a second region.", "faq.txt", SourceType::Txt, ExtractionPattern::ColonMarker),
        ];
        state.service.lock().await.add(records).await.unwrap();
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::EmptyStore), StatusCode::CONFLICT);
        assert_eq!(status_for(&Error::InvalidQuery("empty".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&Error::UnsupportedFormat { path: PathBuf::from("a.md") }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::Configuration("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("faq.pdf").as_deref(), Some("faq.pdf"));
        assert_eq!(sanitize_file_name("C:\\Users\\me\\faq.docx").as_deref(), Some("faq.docx"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name(".env"), None);
        assert_eq!(sanitize_file_name("dir/"), None);
    }

    #[tokio::test]
    async fn test_save_upload_rejects_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_upload(dir.path(), "faq.txt", b"Q: a?\nA: b").await.unwrap();
        assert_eq!(saved, dir.path().join("faq.txt"));
        assert!(saved.exists());

        let failure = save_upload(dir.path(), "notes.md", b"# notes").await.unwrap_err();
        assert_eq!(failure.path, dir.path().join("notes.md"));
        assert!(!failure.path.exists());
    }

    #[tokio::test]
    async fn test_search_on_empty_store_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let request = SearchRequest {
            query: "Is MFA required?".to_string(),
            top_k: None,
            threshold: None,
        };
        let err = search_handler(State(state), Json(request)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_search_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        seed(&state).await;

        let request = SearchRequest {
            query: "Is MFA required?".to_string(),
            top_k: Some(2),
            threshold: Some(0.0),
        };
        let Json(response) = search_handler(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(response.results[0].record.answer, "Yes, for every account.");

        let Json(history) = history_handler(State(state.clone())).await;
        assert_eq!(history["count"], 1);
        assert_eq!(history["entries"][0]["query"], "Is MFA required?");

        clear_history_handler(State(state.clone())).await;
        assert!(state.history.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        seed(&state).await;

        let request = BatchRequest {
            text: Some("Where are backups stored?\n\nIs MFA required?\n".to_string()),
            queries: None,
            mode: BatchMode::Questions,
            top_k: None,
            threshold: Some(0.0),
        };
        let Json(response) = batch_handler(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matched, 2);
        assert_eq!(
            response.matches[0].best().unwrap().record.answer,
            "In a second region."
        );
        assert_eq!(state.last_batch.read().await.len(), 2);
        assert_eq!(state.history.read().await.entries()[0].mode, QueryMode::QuestionList);
    }

    #[tokio::test]
    async fn test_batch_without_input_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let request = BatchRequest {
            text: None,
            queries: None,
            mode: BatchMode::Questions,
            top_k: None,
            threshold: None,
        };
        let err = batch_handler(State(state), Json(request)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rebuild_reset_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(raw.join("faq.txt"), "Q: Is SSO supported?\nA: Yes, SAML and OIDC.\n").unwrap();

        let Json(report) = rebuild_handler(State(state.clone())).await.unwrap();
        assert_eq!(report.records_added, 1);

        let Json(stats) = stats_handler(State(state.clone())).await.unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.dimension, 32);

        reset_handler(State(state.clone())).await.unwrap();
        let Json(stats) = stats_handler(State(state)).await.unwrap();
        assert_eq!(stats.total_entries, 0);
    }
}
