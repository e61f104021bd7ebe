//! TOML configuration.
//!
//! Every section is optional; a missing section takes its defaults, and
//! [`Config::minimal`] is exactly the all-defaults configuration used when
//! no config file is present.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:55317"
//!
//! [sources.local]
//! root = "./data"
//!
//! [sources.s3]
//! region = "us-east-1"
//! page_size = 1000
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [prompt]
//! max_chars = 12000
//!
//! [limits]
//! default_max_files = 100
//! max_files_cap = 1000
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:55317".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub local: LocalSourceConfig,
    #[serde(default)]
    pub s3: S3SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalSourceConfig {
    /// Fixed root directory that local listings are relative to.
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for LocalSourceConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
            follow_symlinks: false,
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3SourceConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// `max-keys` sent with each `ListObjectsV2` page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_s3_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for S3SourceConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            page_size: default_page_size(),
            timeout_secs: default_s3_timeout_secs(),
        }
    }
}

impl S3SourceConfig {
    /// The configured region, overridden by `AWS_REGION` when set.
    pub fn effective_region(&self) -> String {
        std::env::var("AWS_REGION")
            .ok()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| self.region.clone())
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_page_size() -> usize {
    1000
}
fn default_s3_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the provider API. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            url: None,
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// Upper bound on the record summary embedded in the prompt.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_max_row_chars")]
    pub max_row_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            max_row_chars: default_max_row_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    12_000
}
fn default_max_row_chars() -> usize {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_files")]
    pub default_max_files: usize,
    #[serde(default = "default_max_files_cap")]
    pub max_files_cap: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_max_files: default_max_files(),
            max_files_cap: default_max_files_cap(),
        }
    }
}

impl LimitsConfig {
    /// Resolve a requested file cap: default when absent, clamped to
    /// `[1, max_files_cap]`.
    pub fn resolve_max_files(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_files)
            .clamp(1, self.max_files_cap.max(1))
    }
}

fn default_max_files() -> usize {
    100
}
fn default_max_files_cap() -> usize {
    1000
}

impl Config {
    /// All-defaults configuration, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.sources.s3.page_size == 0 || config.sources.s3.page_size > 1000 {
        anyhow::bail!("sources.s3.page_size must be in [1, 1000]");
    }

    if config.prompt.max_chars == 0 {
        anyhow::bail!("prompt.max_chars must be > 0");
    }
    if config.prompt.max_row_chars == 0 {
        anyhow::bail!("prompt.max_row_chars must be > 0");
    }

    if config.limits.max_files_cap == 0 {
        anyhow::bail!("limits.max_files_cap must be >= 1");
    }
    if config.limits.default_max_files == 0
        || config.limits.default_max_files > config.limits.max_files_cap
    {
        anyhow::bail!("limits.default_max_files must be in [1, limits.max_files_cap]");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    Ok(())
}
