//! Language-model clients.
//!
//! - **[`OpenAiModel`]**: `POST {url}/chat/completions` on any
//!   OpenAI-compatible API (default `https://api.openai.com/v1`). Requires
//!   `OPENAI_API_KEY`.
//! - **[`OllamaModel`]**: `POST {url}/api/chat` on a local Ollama instance
//!   (default `http://localhost:11434`).
//!
//! Each call is a single request. Nothing is retried: a failed call becomes
//! an [`AnalysisError::Model`] and the user re-submits.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{AnalysisError, PipelineResult};
use crate::traits::LanguageModel;

/// A single-turn prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Instantiate the configured model client.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiModel {
            client,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            temperature: config.temperature,
        })),
        "ollama" => Ok(Arc::new(OllamaModel {
            client,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            temperature: config.temperature,
        })),
        other => bail!("Unknown llm provider: {}", other),
    }
}

fn messages(prompt: &Prompt) -> Value {
    json!([
        {"role": "system", "content": prompt.system},
        {"role": "user", "content": prompt.user},
    ])
}

/// Send a JSON body and return the decoded JSON response, mapping every
/// failure to a model error labelled with `provider`.
async fn post_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &Value,
) -> PipelineResult<Value> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| AnalysisError::model(format!("{} request failed: {}", provider, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(AnalysisError::model(format!(
            "{} API error {}: {}",
            provider,
            status,
            body_text.chars().take(500).collect::<String>()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AnalysisError::model(format!("{} returned invalid JSON: {}", provider, e)))
}

// ============ OpenAI ============

pub struct OpenAiModel {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> PipelineResult<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AnalysisError::model("OPENAI_API_KEY environment variable not set"))?;

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages(prompt),
        });

        let request = self
            .client
            .post(format!("{}/chat/completions", self.url.trim_end_matches('/')))
            .bearer_auth(api_key);
        let json = post_json("OpenAI", request, &body).await?;
        parse_openai_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_openai_response(json: &Value) -> PipelineResult<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| AnalysisError::model("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

pub struct OllamaModel {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> PipelineResult<String> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": messages(prompt),
            "options": {"temperature": self.temperature},
        });

        let request = self
            .client
            .post(format!("{}/api/chat", self.url.trim_end_matches('/')));
        let json = post_json("Ollama", request, &body).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> PipelineResult<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| AnalysisError::model("Invalid Ollama response: missing message.content"))
}
