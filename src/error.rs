//! Failure taxonomy for the analysis pipeline.
//!
//! Per-file failures ([`AnalysisError::Read`], [`AnalysisError::Parse`]) are
//! absorbed by the loader and only show up as counts. Listing and model
//! failures abort the request. Chart failures are not errors at all; they are
//! carried by [`ChartOutcome::Failure`](crate::models::ChartOutcome::Failure).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Bad bucket, missing directory, or rejected credentials.
    #[error("{0}")]
    SourceUnavailable(String),

    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to parse '{key}' as JSON: {reason}")]
    Parse { key: String, reason: String },

    #[error("language model call failed: {0}")]
    Model(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("No JSON files found in the specified source and prefix")]
    NoFiles,

    #[error("Failed to load any JSON files ({attempted} attempted)")]
    NothingLoaded { attempted: usize },
}

impl AnalysisError {
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

pub type PipelineResult<T> = std::result::Result<T, AnalysisError>;
