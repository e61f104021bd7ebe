//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | API banner |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/list_files` | List JSON files in a local or S3 source |
//! | `POST` | `/analyze` | Answer a question about the files, with a chart |
//!
//! # Error Contract
//!
//! Every error response is `{"detail": "<human-readable message>"}`:
//!
//! | Condition | Status |
//! |-----------|--------|
//! | invalid request, missing bucket name, empty query | 400 |
//! | source unavailable (bad bucket, path, credentials) | 400 |
//! | no JSON files found | 404 |
//! | no file could be parsed | 422 |
//! | language model failure | 502 |
//!
//! Chart failures are not errors: the response is 200 with
//! `visualization_error` next to the answer.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can be served from anywhere.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::analysis;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::llm::create_model;
use crate::models::{
    AnalysisRequest, AnalysisResult, FileHandle, SourceDescriptor, SourceKind, Theme,
};
use crate::traits::LanguageModel;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    model: Arc<dyn LanguageModel>,
}

/// Start the server on `[server].bind` with the configured model.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let model = create_model(&config.llm)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    run_server_on(listener, config, model).await
}

/// Serve on an already bound listener with the given model.
pub async fn run_server_on(
    listener: tokio::net::TcpListener,
    config: &Config,
    model: Arc<dyn LanguageModel>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = router(config, model);
    info!(%addr, "JSON visualizer listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(config: &Config, model: Arc<dyn LanguageModel>) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        model,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/list_files", get(handle_list_files))
        .route("/analyze", post(handle_analyze))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let status = match &err {
            AnalysisError::InvalidRequest(_) | AnalysisError::SourceUnavailable(_) => {
                StatusCode::BAD_REQUEST
            }
            AnalysisError::NoFiles => StatusCode::NOT_FOUND,
            AnalysisError::NothingLoaded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::Model(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::Read { .. } | AnalysisError::Parse { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("request failed: {}", err);
        } else {
            warn!("request rejected: {}", err);
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

// ============ GET / and /health ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "JSON Visualizer API" }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Request decoding ============

/// Resolve the wire source fields into a descriptor. Without an explicit
/// `source_type`, a non-empty `bucket_name` selects S3.
fn source_descriptor(
    config: &Config,
    source_type: Option<&str>,
    bucket_name: Option<String>,
    prefix: Option<String>,
    max_files: Option<usize>,
) -> Result<SourceDescriptor, AppError> {
    let kind = match source_type.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<SourceKind>().map_err(AppError::bad_request)?,
        None if bucket_name.as_deref().is_some_and(|b| !b.trim().is_empty()) => SourceKind::Bucket,
        None => SourceKind::Local,
    };

    let source = SourceDescriptor {
        kind,
        bucket_name,
        prefix: prefix.filter(|p| !p.is_empty()),
        max_files: config.limits.resolve_max_files(max_files),
    };
    source.validate()?;
    Ok(source)
}

// ============ GET /list_files ============

#[derive(Debug, Deserialize)]
struct ListFilesParams {
    source_type: Option<String>,
    bucket_name: Option<String>,
    prefix: Option<String>,
    max_files: Option<usize>,
}

#[derive(Serialize)]
struct ListFilesResponse {
    files: Vec<FileHandle>,
    count: usize,
}

async fn handle_list_files(
    State(state): State<AppState>,
    params: Result<Query<ListFilesParams>, QueryRejection>,
) -> Result<Json<ListFilesResponse>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;

    // Listing is a browse operation: without max_files, list up to the cap.
    let max_files = params.max_files.or(Some(state.config.limits.max_files_cap));
    let source = source_descriptor(
        &state.config,
        params.source_type.as_deref(),
        params.bucket_name,
        params.prefix,
        max_files,
    )?;

    let files = analysis::list_files(&state.config, &source).await?;
    info!(source = source.kind.as_str(), count = files.len(), "list_files");
    Ok(Json(ListFilesResponse {
        count: files.len(),
        files,
    }))
}

// ============ POST /analyze ============

#[derive(Debug, Deserialize)]
struct AnalyzeBody {
    #[serde(default)]
    source_type: Option<String>,
    #[serde(default)]
    bucket_name: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    max_files: Option<usize>,
    #[serde(default)]
    query: String,
    #[serde(default)]
    dark_mode: bool,
}

async fn handle_analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Json(body) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let request = AnalysisRequest {
        source: source_descriptor(
            &state.config,
            body.source_type.as_deref(),
            body.bucket_name,
            body.prefix,
            body.max_files,
        )?,
        query: body.query,
        theme: Theme::from_dark_mode(body.dark_mode),
    };

    let result = analysis::run_analysis(&state.config, state.model.as_ref(), &request).await?;
    info!(
        files_processed = result.files_processed,
        total_files_found = result.total_files_found,
        "analyze"
    );
    Ok(Json(result))
}
