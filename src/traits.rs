//! Extension seams: where files come from and which model answers.
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │        FileSource        │      │      LanguageModel       │
//! │  ┌───────┐  ┌─────────┐  │      │  ┌────────┐ ┌────────┐   │
//! │  │ Local │  │   S3    │  │      │  │ OpenAI │ │ Ollama │   │
//! │  └───────┘  └─────────┘  │      │  └────────┘ └────────┘   │
//! └────────────┬─────────────┘      └────────────┬─────────────┘
//!              ▼                                 ▼
//!        load_documents()  ────────────▶     analyze()
//! ```
//!
//! Both traits are object-safe so the server can hold them behind `Arc<dyn _>`
//! and tests can substitute in-memory implementations.

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::llm::Prompt;
use crate::models::FileHandle;

/// A place JSON files can be listed and read from.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use json_visualizer::error::{AnalysisError, PipelineResult};
/// use json_visualizer::models::FileHandle;
/// use json_visualizer::traits::FileSource;
///
/// struct Fixed(Vec<(String, Vec<u8>)>);
///
/// #[async_trait]
/// impl FileSource for Fixed {
///     fn source_type(&self) -> &str { "fixed" }
///
///     async fn list_files(&self, max_files: usize) -> PipelineResult<Vec<FileHandle>> {
///         Ok(self.0.iter().take(max_files)
///             .map(|(k, b)| FileHandle::new(k.clone(), b.len() as u64))
///             .collect())
///     }
///
///     async fn read_file(&self, handle: &FileHandle) -> PipelineResult<Vec<u8>> {
///         self.0.iter().find(|(k, _)| *k == handle.key)
///             .map(|(_, b)| b.clone())
///             .ok_or_else(|| AnalysisError::Read {
///                 key: handle.key.clone(),
///                 reason: "missing".into(),
///             })
///     }
/// }
/// ```
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Short backend identifier (`"local"`, `"s3"`), used in logs.
    fn source_type(&self) -> &str;

    /// List `.json` files in stable order, at most `max_files` of them.
    ///
    /// Fails with [`AnalysisError::SourceUnavailable`](crate::error::AnalysisError::SourceUnavailable)
    /// when the location or credentials are bad.
    async fn list_files(&self, max_files: usize) -> PipelineResult<Vec<FileHandle>>;

    /// Read the raw bytes of a listed file.
    ///
    /// Fails with [`AnalysisError::Read`](crate::error::AnalysisError::Read)
    /// when the file vanished or is unreadable.
    async fn read_file(&self, handle: &FileHandle) -> PipelineResult<Vec<u8>>;
}

/// A language-model service that turns one prompt into free text.
///
/// Implementations make exactly one request per call and do not retry.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, used in logs.
    fn model_name(&self) -> &str;

    /// Submit the prompt and return the raw completion text.
    ///
    /// Any transport, auth, quota, or envelope failure is an
    /// [`AnalysisError::Model`](crate::error::AnalysisError::Model).
    async fn complete(&self, prompt: &Prompt) -> PipelineResult<String>;
}
