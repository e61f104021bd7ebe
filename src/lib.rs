//! # JSON Visualizer
//!
//! Ask a natural-language question about a collection of JSON files (a local
//! directory or an S3 bucket) and get a textual answer plus an optional
//! Plotly-compatible chart specification.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌───────────────┐   ┌─────────┐
//! │ FileSource  │──▶│  Loader  │──▶│ Query (LLM)   │──▶│  Chart  │
//! │  Local/S3   │   │ JSON→Rec │   │ answer+intent │   │ builder │
//! └─────────────┘   └──────────┘   └───────────────┘   └────┬────┘
//!                                                           │
//!                            ┌──────────────────────────────┤
//!                            ▼                              ▼
//!                       ┌──────────┐                  ┌──────────┐
//!                       │   CLI    │                  │   HTTP   │
//!                       │  (jviz)  │                  │  (axum)  │
//!                       └──────────┘                  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Request, record, intent, and result types |
//! | [`error`] | Failure taxonomy |
//! | [`traits`] | `FileSource` and `LanguageModel` seams |
//! | [`connector_fs`] | Local directory source |
//! | [`connector_s3`] | Amazon S3 source |
//! | [`sources`] | Source selection from a descriptor |
//! | [`loader`] | Fault-tolerant JSON loading |
//! | [`rows`] | Row view and field paths over records |
//! | [`summary`] | Bounded record summary for prompts |
//! | [`llm`] | OpenAI and Ollama clients |
//! | [`query`] | Prompt building and response decoding |
//! | [`chart`] | Aggregation and chart specs |
//! | [`analysis`] | End-to-end list and analyze operations |
//! | [`server`] | HTTP API |

pub mod analysis;
pub mod chart;
pub mod config;
pub mod connector_fs;
pub mod connector_s3;
pub mod error;
pub mod llm;
pub mod loader;
pub mod models;
pub mod query;
pub mod rows;
pub mod sources;
pub mod summary;
pub mod server;
pub mod traits;
