//! Shared fixtures: a scripted language model and a temporary data root.

#![allow(dead_code)]

use async_trait::async_trait;
use json_visualizer::config::Config;
use json_visualizer::error::{AnalysisError, PipelineResult};
use json_visualizer::llm::Prompt;
use json_visualizer::traits::LanguageModel;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

/// Returns a fixed reply (or failure) and records every prompt it saw.
pub struct ScriptedModel {
    reply: Result<String, String>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &Prompt) -> PipelineResult<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.reply.clone().map_err(AnalysisError::Model)
    }
}

/// Model reply carrying a chart directive.
pub fn reply_with_chart(answer: &str, directive: &str) -> String {
    format!("{}\n\n```chart\n{}\n```\n", answer, directive)
}

/// A data root holding three test-run files, one malformed file, and a
/// non-JSON file; plus a config pointing at it.
pub fn setup_data_root() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("data");
    fs::create_dir_all(root.join("nightly")).unwrap();

    fs::write(
        root.join("run_1.json"),
        r#"{"status": "pass", "duration_ms": 120}"#,
    )
    .unwrap();
    fs::write(
        root.join("run_2.json"),
        r#"{"status": "pass", "duration_ms": 80}"#,
    )
    .unwrap();
    fs::write(
        root.join("run_3.json"),
        r#"{"status": "fail", "duration_ms": 400}"#,
    )
    .unwrap();
    fs::write(root.join("run_4_broken.json"), r#"{"status": "pa"#).unwrap();
    fs::write(root.join("README.md"), "# not json").unwrap();
    fs::write(
        root.join("nightly/batch.json"),
        r#"[{"suite": "api", "status": "pass"}, {"suite": "ui", "status": "fail"}]"#,
    )
    .unwrap();

    let mut config = Config::minimal();
    config.sources.local.root = root;
    (tmp, config)
}
