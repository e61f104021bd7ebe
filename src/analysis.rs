//! The analyze and list operations, shared by the HTTP server and the CLI.
//!
//! ```text
//! list_files ──▶ load_documents ──▶ query::analyze ──▶ build_chart
//!   (abort)          (absorb)           (abort)          (report)
//! ```
//!
//! Steps run one after another for a request. Listing and model failures
//! abort with an [`AnalysisError`]; per-file failures are absorbed by the
//! loader; chart failures land in the result next to the answer.

use tracing::info;

use crate::chart::build_chart;
use crate::config::Config;
use crate::error::{AnalysisError, PipelineResult};
use crate::loader::load_documents;
use crate::models::{AnalysisRequest, AnalysisResult, FileHandle, SourceDescriptor};
use crate::query;
use crate::sources::open_source;
use crate::traits::{FileSource, LanguageModel};

/// List the JSON files a descriptor points at.
pub async fn list_files(config: &Config, source: &SourceDescriptor) -> PipelineResult<Vec<FileHandle>> {
    let backend = open_source(config, source)?;
    backend.list_files(source.max_files).await
}

/// Run the full pipeline for a request against the configured backends.
pub async fn run_analysis(
    config: &Config,
    model: &dyn LanguageModel,
    request: &AnalysisRequest,
) -> PipelineResult<AnalysisResult> {
    request.validate()?;
    let backend = open_source(config, &request.source)?;
    run_analysis_with_source(config, backend.as_ref(), model, request).await
}

/// Run the full pipeline against an already opened source.
pub async fn run_analysis_with_source(
    config: &Config,
    source: &dyn FileSource,
    model: &dyn LanguageModel,
    request: &AnalysisRequest,
) -> PipelineResult<AnalysisResult> {
    request.validate()?;
    let max_files = request.source.max_files;

    let handles = source.list_files(max_files).await?;
    if handles.is_empty() {
        return Err(AnalysisError::NoFiles);
    }
    info!(source = source.source_type(), found = handles.len(), "listed files");

    let loaded = load_documents(source, &handles, max_files).await;
    if loaded.records.is_empty() {
        return Err(AnalysisError::NothingLoaded {
            attempted: loaded.attempted,
        });
    }
    info!(
        loaded = loaded.records.len(),
        skipped = loaded.skipped.len(),
        "loaded documents"
    );

    let (message, intent) =
        query::analyze(model, &loaded.records, &request.query, &config.prompt).await?;

    let chart = build_chart(&loaded.records, &intent, request.theme);
    if let Some(reason) = chart.failure() {
        info!("chart not built: {}", reason);
    }

    Ok(AnalysisResult {
        message,
        files_processed: loaded.records.len(),
        total_files_found: handles.len(),
        chart,
    })
}
