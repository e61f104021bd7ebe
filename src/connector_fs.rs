//! Local filesystem source.
//!
//! Lists `*.json` files (extension matched case-insensitively) under the
//! configured root directory, optionally restricted to relative paths that
//! start with a prefix. Keys are root-relative paths with `/` separators.

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::LocalSourceConfig;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::FileHandle;
use crate::traits::FileSource;

pub struct LocalSource {
    root: PathBuf,
    prefix: String,
    follow_symlinks: bool,
}

impl LocalSource {
    pub fn new(config: &LocalSourceConfig, prefix: &str) -> Self {
        Self {
            root: config.root.clone(),
            prefix: prefix.trim_start_matches("./").to_string(),
            follow_symlinks: config.follow_symlinks,
        }
    }
}

#[async_trait]
impl FileSource for LocalSource {
    fn source_type(&self) -> &str {
        "local"
    }

    async fn list_files(&self, max_files: usize) -> PipelineResult<Vec<FileHandle>> {
        let mut files = scan_json_files(&self.root, &self.prefix, self.follow_symlinks)?;
        files.truncate(max_files);
        debug!(root = %self.root.display(), count = files.len(), "listed local files");
        Ok(files)
    }

    async fn read_file(&self, handle: &FileHandle) -> PipelineResult<Vec<u8>> {
        let path = self.root.join(&handle.key);
        tokio::fs::read(&path).await.map_err(|e| AnalysisError::Read {
            key: handle.key.clone(),
            reason: e.to_string(),
        })
    }
}

/// Walk `root` and return every JSON file whose relative path starts with
/// `prefix`, sorted by relative path.
fn scan_json_files(root: &Path, prefix: &str, follow_symlinks: bool) -> PipelineResult<Vec<FileHandle>> {
    if !root.is_dir() {
        return Err(AnalysisError::source_unavailable(format!(
            "Local source directory does not exist: {}",
            root.display()
        )));
    }

    let matcher = json_matcher()?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry.map_err(|e| {
            AnalysisError::source_unavailable(format!(
                "Failed to list {}: {}",
                root.display(),
                e
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !rel_str.starts_with(prefix) {
            continue;
        }
        if !matcher.is_match(&rel_str) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let mut handle = FileHandle::new(rel_str, size);
        handle.last_modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
        files.push(handle);
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(files)
}

fn json_matcher() -> PipelineResult<GlobMatcher> {
    GlobBuilder::new("**/*.json")
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| AnalysisError::source_unavailable(e.to_string()))
}
