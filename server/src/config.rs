use std::path::PathBuf;

use clap::{Args, ValueEnum};
use fw_ai::embeddings::DEFAULT_EMBED_MODEL;
use fw_ai::evidence::ChunkParams;
use fw_ai::evidence::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use fw_ai::llm::openai_llm::DEFAULT_OPENAI_BASE_URL;
use fw_ai::llm::DEFAULT_LLM_MODEL;
use fw_ai::retrieve::DEFAULT_TOP_K;
use fw_ai::vector::pinecone::DEFAULT_INDEX_NAME;
use fw_core::error::AppError;
use serde::Serialize;

pub const DEFAULT_EMBED_URL: &str = "http://127.0.0.1:8080/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Hosted Pinecone serverless index.
    Pinecone,
    /// Process-local exact scan, filled from the chunk store at startup.
    Memory,
}

/// Settings shared by every subcommand. Each flag falls back to an
/// environment variable; `.env` is loaded before parsing.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Root for downloaded filings, the manifest and the index ledger.
    #[arg(long, env = "FINWISER_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Directory of `TICKER_FORMTYPE_FILEDATE.txt` files [default: <data-dir>/filings_text].
    #[arg(long, env = "FINWISER_FILINGS_DIR", global = true)]
    pub filings_dir: Option<PathBuf>,

    /// CSV manifest of filings to fetch [default: <data-dir>/sec_filings.csv].
    #[arg(long, env = "FINWISER_MANIFEST", global = true)]
    pub manifest: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible embeddings service.
    #[arg(long, env = "FINWISER_EMBED_URL", default_value = DEFAULT_EMBED_URL, global = true)]
    pub embed_url: String,

    /// Bearer key for the embeddings service, when it wants one.
    #[arg(long, env = "FINWISER_EMBED_API_KEY", hide_env_values = true, global = true)]
    pub embed_api_key: Option<String>,

    #[arg(long, env = "FINWISER_EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL, global = true)]
    pub embed_model: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "FINWISER_OPENAI_BASE", default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    pub openai_base_url: String,

    #[arg(long, env = "FINWISER_LLM_MODEL", default_value = DEFAULT_LLM_MODEL, global = true)]
    pub llm_model: String,

    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true, global = true)]
    pub pinecone_api_key: Option<String>,

    #[arg(long, env = "FINWISER_INDEX_NAME", default_value = DEFAULT_INDEX_NAME, global = true)]
    pub index_name: String,

    #[arg(
        long,
        env = "FINWISER_VECTOR_BACKEND",
        value_enum,
        default_value_t = VectorBackend::Pinecone,
        global = true
    )]
    pub vector_backend: VectorBackend,

    /// Chunks retrieved per question (clamped to 1..=50).
    #[arg(long, default_value_t = DEFAULT_TOP_K, global = true)]
    pub top_k: u32,

    /// Words per chunk.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks; must be smaller than the chunk size.
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP, global = true)]
    pub chunk_overlap: usize,
}

impl Settings {
    pub fn filings_dir(&self) -> PathBuf {
        self.filings_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("filings_text"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.data_dir.join("sec_filings.csv"))
    }

    pub fn chunk_params(&self) -> Result<ChunkParams, AppError> {
        ChunkParams::new(self.chunk_size, self.chunk_overlap)
    }
}
