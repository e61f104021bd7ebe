//! Core data models used throughout the JSON visualizer.
//!
//! Every value here is built per request and dropped once the response is
//! sent.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::chart::ChartSpec;
use crate::error::{AnalysisError, PipelineResult};

/// Which backend a [`SourceDescriptor`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    #[serde(rename = "s3", alias = "bucket")]
    Bucket,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Bucket => "s3",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(SourceKind::Local),
            "s3" | "bucket" => Ok(SourceKind::Bucket),
            other => Err(format!(
                "unknown source type '{}': must be local or s3",
                other
            )),
        }
    }
}

/// User-specified location and limits for input JSON files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub bucket_name: Option<String>,
    pub prefix: Option<String>,
    pub max_files: usize,
}

impl SourceDescriptor {
    pub fn local(prefix: Option<String>, max_files: usize) -> Self {
        Self {
            kind: SourceKind::Local,
            bucket_name: None,
            prefix,
            max_files,
        }
    }

    pub fn s3(bucket_name: impl Into<String>, prefix: Option<String>, max_files: usize) -> Self {
        Self {
            kind: SourceKind::Bucket,
            bucket_name: Some(bucket_name.into()),
            prefix,
            max_files,
        }
    }

    /// Checks the descriptor invariants: a bucket source names its bucket,
    /// and at least one file may be read.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.kind == SourceKind::Bucket && self.bucket().is_none() {
            return Err(AnalysisError::invalid(
                "bucket_name is required when source_type is s3",
            ));
        }
        if self.max_files == 0 {
            return Err(AnalysisError::invalid("max_files must be >= 1"));
        }
        Ok(())
    }

    /// Bucket name, ignoring blank values.
    pub fn bucket(&self) -> Option<&str> {
        self.bucket_name
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// Key prefix, ignoring blank values.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// A listed file. `key` is the object key or the path relative to the local
/// root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    pub key: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl FileHandle {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
        }
    }
}

/// One successfully parsed JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    pub source_key: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source: SourceDescriptor,
    pub query: String,
    pub theme: Theme,
}

impl AnalysisRequest {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.query.trim().is_empty() {
            return Err(AnalysisError::invalid("query must not be empty"));
        }
        self.source.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Pie,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Distinct,
    Mean,
    #[default]
    None,
}

/// What the model asked to visualize.
///
/// `fields[0]` is the measured field. `fields[1]`, when present, is the
/// x-axis for line/scatter charts or the group key for count/mean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartIntent {
    pub chart_type: ChartType,
    pub fields: Vec<String>,
    pub aggregation: Aggregation,
}

impl ChartIntent {
    pub fn none() -> Self {
        Self {
            chart_type: ChartType::None,
            fields: Vec::new(),
            aggregation: Aggregation::None,
        }
    }

    pub fn new(chart_type: ChartType, fields: &[&str], aggregation: Aggregation) -> Self {
        Self {
            chart_type,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            aggregation,
        }
    }

    pub fn is_none(&self) -> bool {
        self.chart_type == ChartType::None
    }
}

/// Result of chart building. A failure is reported next to the answer and
/// never fails the request.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    NoChart,
    Chart(ChartSpec),
    Failure(String),
}

impl ChartOutcome {
    pub fn spec(&self) -> Option<&ChartSpec> {
        match self {
            ChartOutcome::Chart(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ChartOutcome::Failure(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Response of the analyze operation.
///
/// Serializes to `{message, success, files_processed, total_files_found}` plus
/// `visualization` or `visualization_error` depending on the chart outcome.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub message: String,
    pub files_processed: usize,
    pub total_files_found: usize,
    pub chart: ChartOutcome,
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("success", &true)?;
        map.serialize_entry("files_processed", &self.files_processed)?;
        map.serialize_entry("total_files_found", &self.total_files_found)?;
        match &self.chart {
            ChartOutcome::NoChart => {}
            ChartOutcome::Chart(spec) => map.serialize_entry("visualization", spec)?,
            ChartOutcome::Failure(reason) => map.serialize_entry("visualization_error", reason)?,
        }
        map.end()
    }
}
