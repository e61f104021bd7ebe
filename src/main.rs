//! # JSON Visualizer CLI (`jviz`)
//!
//! Ask natural-language questions about a collection of JSON files stored
//! in a local directory or an S3 bucket, and get an answer plus a chart.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jviz serve` | Start the HTTP API |
//! | `jviz list` | List the JSON files a source points at |
//! | `jviz analyze "<query>"` | Run the analysis pipeline once and print the result |
//!
//! ## Examples
//!
//! ```bash
//! # Serve the API with settings from ./config/jviz.toml
//! jviz serve
//!
//! # List files in a bucket prefix
//! jviz list --source s3 --bucket test-results --prefix runs/2024/
//!
//! # Ask a question about local files and print the full JSON result
//! jviz analyze "How many runs failed?" --source local --json
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use json_visualizer::analysis;
use json_visualizer::config::{self, Config};
use json_visualizer::llm::create_model;
use json_visualizer::models::{AnalysisRequest, SourceDescriptor, SourceKind, Theme};
use json_visualizer::server;

/// JSON Visualizer: question answering and charts over JSON file collections.
#[derive(Parser)]
#[command(name = "jviz", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the file does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/jviz.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// List JSON files in a source.
    List {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Analyze JSON files with a natural-language question.
    Analyze {
        /// The question to ask about the files.
        query: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Use dark chart colors.
        #[arg(long)]
        dark: bool,

        /// Print the full result as JSON instead of the answer text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Source type: `local` (configured root directory) or `s3`.
    #[arg(long, default_value = "local")]
    source: SourceKind,

    /// Bucket name, required for `--source s3`.
    #[arg(long)]
    bucket: Option<String>,

    /// Key prefix (S3) or relative path prefix (local).
    #[arg(long)]
    prefix: Option<String>,

    /// Maximum number of files to process.
    #[arg(long)]
    max_files: Option<usize>,
}

impl SourceArgs {
    fn descriptor(&self, config: &Config) -> SourceDescriptor {
        SourceDescriptor {
            kind: self.source,
            bucket_name: self.bucket.clone(),
            prefix: self.prefix.clone(),
            max_files: config.limits.resolve_max_files(self.max_files),
        }
    }
}

fn load_or_default(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List { source } => {
            let descriptor = source.descriptor(&cfg);
            let files = analysis::list_files(&cfg, &descriptor).await?;
            println!("{:<60} {:>12}", "KEY", "SIZE");
            for file in &files {
                println!("{:<60} {:>12}", file.key, file.size);
            }
            println!("{} file(s)", files.len());
        }
        Commands::Analyze {
            query,
            source,
            dark,
            json,
        } => {
            let model = create_model(&cfg.llm)?;
            let request = AnalysisRequest {
                source: source.descriptor(&cfg),
                query,
                theme: Theme::from_dark_mode(dark),
            };
            let result = analysis::run_analysis(&cfg, model.as_ref(), &request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.message);
                println!();
                println!(
                    "files processed: {} of {}",
                    result.files_processed, result.total_files_found
                );
                if let Some(spec) = result.chart.spec() {
                    println!("chart: {}", spec.layout.title.text);
                    for (label, value) in spec.points() {
                        println!("  {:<40} {}", label, value);
                    }
                }
                if let Some(reason) = result.chart.failure() {
                    println!("chart unavailable: {}", reason);
                }
            }
        }
    }

    Ok(())
}
