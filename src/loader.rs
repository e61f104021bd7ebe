//! Document loading.
//!
//! Reads listed files one after another and parses each as JSON. A file that
//! cannot be read or parsed is logged and skipped; it only shows up in the
//! counts of the returned [`LoadOutcome`].

use tracing::warn;

use crate::error::AnalysisError;
use crate::models::{FileHandle, JsonRecord};
use crate::traits::FileSource;

#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Parsed records, in input handle order.
    pub records: Vec<JsonRecord>,
    /// Number of handles read or attempted.
    pub attempted: usize,
    /// Per-file failures that were absorbed.
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub key: String,
    pub reason: String,
}

pub async fn load_documents(
    source: &dyn FileSource,
    handles: &[FileHandle],
    max_files: usize,
) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for handle in handles.iter().take(max_files) {
        outcome.attempted += 1;

        let parsed = match source.read_file(handle).await {
            Ok(bytes) => parse_record(&handle.key, &bytes),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!(key = %handle.key, source = source.source_type(), "skipping file: {}", e);
                outcome.skipped.push(SkippedFile {
                    key: handle.key.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}

/// Parse one file's bytes, tolerating a UTF-8 byte-order mark.
pub fn parse_record(key: &str, bytes: &[u8]) -> Result<JsonRecord, AnalysisError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    serde_json::from_slice(bytes)
        .map(|content| JsonRecord {
            source_key: key.to_string(),
            content,
        })
        .map_err(|e| AnalysisError::Parse {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineResult;
    use async_trait::async_trait;

    struct MemorySource(Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl FileSource for MemorySource {
        fn source_type(&self) -> &str {
            "memory"
        }

        async fn list_files(&self, max_files: usize) -> PipelineResult<Vec<FileHandle>> {
            Ok(self
                .0
                .iter()
                .take(max_files)
                .map(|(k, body)| FileHandle::new(*k, body.len() as u64))
                .collect())
        }

        async fn read_file(&self, handle: &FileHandle) -> PipelineResult<Vec<u8>> {
            self.0
                .iter()
                .find(|(k, _)| *k == handle.key)
                .map(|(_, body)| body.as_bytes().to_vec())
                .ok_or_else(|| AnalysisError::Read {
                    key: handle.key.clone(),
                    reason: "gone".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped_not_fatal() {
        let source = MemorySource(vec![
            ("a.json", r#"{"status":"pass"}"#),
            ("b.json", r#"{"status": "#),
            ("c.json", r#"{"status":"fail"}"#),
            ("d.json", r#"[1, 2]"#),
        ]);
        let handles = source.list_files(10).await.unwrap();
        let outcome = load_documents(&source, &handles, 10).await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.attempted, 4);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].key, "b.json");
        let keys: Vec<&str> = outcome.records.iter().map(|r| r.source_key.as_str()).collect();
        assert_eq!(keys, vec!["a.json", "c.json", "d.json"]);
    }

    #[tokio::test]
    async fn test_vanished_file_is_counted() {
        let source = MemorySource(vec![("a.json", "{}")]);
        let handles = vec![FileHandle::new("a.json", 2), FileHandle::new("gone.json", 2)];
        let outcome = load_documents(&source, &handles, 10).await;
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.attempted, 2);
    }

    #[tokio::test]
    async fn test_respects_max_files() {
        let source = MemorySource(vec![("a.json", "1"), ("b.json", "2"), ("c.json", "3")]);
        let handles = source.list_files(10).await.unwrap();
        let outcome = load_documents(&source, &handles, 2).await;
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn test_parse_record_strips_bom() {
        let record = parse_record("x.json", b"\xEF\xBB\xBF{\"k\": 1}").unwrap();
        assert_eq!(record.content["k"], 1);
    }
}
