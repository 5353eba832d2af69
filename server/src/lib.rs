pub mod app;
pub mod client;
pub mod config;
pub mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fw_ai::evidence::DEFAULT_EMBED_BATCH;
use fw_core::error::AppError;
use fw_core::ingest::fetch::{fetch_and_save_filings, FetchOptions, DEFAULT_USER_AGENT};
use fw_core::ingest::manifest::ManifestSelection;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "finwiser", version, about = "Grounded Q&A over SEC 10-K / 10-Q filings")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the filings selected from the manifest as plain text.
    Fetch {
        /// Form types to keep; empty keeps every form.
        #[arg(long, value_delimiter = ',', default_values_t = ["10-K".to_string(), "10-Q".to_string()])]
        forms: Vec<String>,

        /// Distinct tickers to keep, in manifest order.
        #[arg(long, default_value_t = 3)]
        max_companies: usize,

        #[arg(long, default_value_t = 2)]
        max_filings_per_company: usize,

        /// EDGAR asks for a contact in the User-Agent.
        #[arg(long, env = "FINWISER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
        user_agent: String,

        /// Pause after each download, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
    /// Chunk the filings directory and print per-filing counts.
    Chunk,
    /// Embed changed chunks and upsert them into the vector index.
    Index {
        /// Re-embed every chunk even when its text is unchanged.
        #[arg(long)]
        force: bool,

        #[arg(long, default_value_t = DEFAULT_EMBED_BATCH)]
        batch_size: usize,
    },
    /// Answer one question, locally or through a running server.
    Ask {
        question: String,

        /// `/ask` endpoint of a running server, e.g. http://localhost:8000/ask.
        #[arg(long, env = "FINWISER_API_URL")]
        api_url: Option<String>,
    },
    /// Serve `POST /ask` and `GET /healthz`.
    Serve {
        #[arg(long, env = "FINWISER_BIND", default_value = "127.0.0.1:8000")]
        bind: String,
    },
}

#[derive(Debug, Serialize)]
struct ChunkReport {
    filings: usize,
    chunks: usize,
    per_filing: BTreeMap<String, usize>,
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();
    execute(cli)
}

pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings;
    match cli.command {
        Command::Fetch {
            forms,
            max_companies,
            max_filings_per_company,
            user_agent,
            delay_ms,
        } => {
            let selection = ManifestSelection {
                form_types: forms.into_iter().filter(|f| !f.trim().is_empty()).collect(),
                max_companies,
                max_filings_per_company,
            };
            let mut opts = FetchOptions::new(settings.filings_dir());
            opts.user_agent = user_agent;
            opts.polite_delay = Duration::from_millis(delay_ms);
            let summary = fetch_and_save_filings(&settings.manifest_path(), &selection, opts)?;
            print_json(&summary)
        }
        Command::Chunk => {
            let store = app::load_chunks(&settings)?;
            let mut per_filing = BTreeMap::new();
            for c in store.chunks() {
                *per_filing.entry(c.metadata.source_file.clone()).or_insert(0usize) += 1;
            }
            print_json(&ChunkReport {
                filings: store.filing_count(),
                chunks: store.len(),
                per_filing,
            })
        }
        Command::Index { force, batch_size } => {
            let chunks = app::load_chunks(&settings)?;
            let embedder = app::embedder(&settings)?;
            let store = app::vector_store(&settings)?;
            let report = app::index_chunks(
                &settings,
                &chunks,
                &embedder,
                store.as_ref(),
                force,
                batch_size,
                now_rfc3339_utc()?,
            )?;
            print_json(&report)
        }
        Command::Ask { question, api_url } => {
            let result = match api_url {
                Some(url) => client::ask_remote(&url, &question)?,
                None => app::build_pipeline(&settings)?.ask(&question)?,
            };
            println!("{}", result.answer);
            if !result.sources.is_empty() {
                println!();
                println!("Sources:");
                for s in &result.sources {
                    println!("  - {s}");
                }
            }
            Ok(())
        }
        Command::Serve { bind } => {
            let pipeline = app::build_pipeline(&settings)?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime.block_on(http::serve(http::AppState::new(pipeline), &bind))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::new("INDEX_TIME_FAILED", "Failed to format time").with_details(e.to_string()))
}
