use fw_ai::answer::{context_budget, AnswerAgent};
use fw_ai::embeddings::http_embed::HttpEmbedder;
use fw_ai::embeddings::{Embedder, EMBEDDING_DIMS};
use fw_ai::evidence::{
    embed_and_upsert, ChunkStore, IndexBuildInput, IndexLedger, IndexStatus, DEFAULT_EMBED_BATCH,
};
use fw_ai::hosted::ServiceEndpoint;
use fw_ai::llm::openai_llm::OpenAiLlm;
use fw_ai::pipeline::RagPipeline;
use fw_ai::retrieve::Retriever;
use fw_ai::vector::{MemoryVectorStore, PineconeConfig, PineconeStore, VectorStore};
use fw_core::error::AppError;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Settings, VectorBackend};

pub fn load_chunks(settings: &Settings) -> Result<ChunkStore, AppError> {
    ChunkStore::load_dir(&settings.filings_dir(), settings.chunk_params()?)
}

pub fn embedder(settings: &Settings) -> Result<HttpEmbedder, AppError> {
    let mut endpoint = ServiceEndpoint::new(&settings.embed_url)?;
    if let Some(key) = settings.embed_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        endpoint = endpoint.with_api_key(key)?;
    }
    Ok(HttpEmbedder::new(endpoint))
}

pub fn llm(settings: &Settings) -> Result<OpenAiLlm, AppError> {
    let key = settings.openai_api_key.as_deref().unwrap_or_default();
    let endpoint = ServiceEndpoint::new(&settings.openai_base_url)?.with_api_key(key)?;
    OpenAiLlm::new(endpoint)
}

/// Open the configured vector backend. A memory backend starts empty.
pub fn vector_store(settings: &Settings) -> Result<Box<dyn VectorStore>, AppError> {
    match settings.vector_backend {
        VectorBackend::Pinecone => {
            let key = settings.pinecone_api_key.clone().unwrap_or_default();
            let store = PineconeStore::connect(PineconeConfig::new(key, settings.index_name.clone()))?;
            Ok(Box::new(store))
        }
        VectorBackend::Memory => Ok(Box::new(MemoryVectorStore::new(EMBEDDING_DIMS))),
    }
}

/// Chunk store, retriever and answer agent wired for `ask` and `serve`.
///
/// With the memory backend every chunk is embedded into the fresh store
/// before the pipeline is returned.
pub fn build_pipeline(settings: &Settings) -> Result<RagPipeline, AppError> {
    let chunks = load_chunks(settings)?;
    if chunks.is_empty() {
        warn!(dir = %settings.filings_dir().display(), "no chunks loaded; every answer will be the fallback");
    }

    // Credentials are checked before any network call.
    let llm = llm(settings)?;
    let embedder = embedder(settings)?;
    let store = vector_store(settings)?;
    if settings.vector_backend == VectorBackend::Memory && !chunks.is_empty() {
        let all = chunks.chunks().iter().collect::<Vec<_>>();
        let n = embed_and_upsert(&all, &embedder, store.as_ref(), &settings.embed_model, DEFAULT_EMBED_BATCH)?;
        info!(vectors = n, "in-memory index populated");
    }

    let retriever = Retriever::new(Box::new(embedder), store, settings.embed_model.clone())
        .with_top_k(settings.top_k);
    let budget = context_budget(retriever.top_k(), settings.chunk_size);
    let agent = AnswerAgent::new(Box::new(llm), settings.llm_model.clone()).with_max_context_chars(budget);
    Ok(RagPipeline::new(chunks, retriever, agent))
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub backend: VectorBackend,
    pub upserted: usize,
    /// Ledger state after the build; absent for the memory backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<IndexStatus>,
}

/// Push `chunks` into `store`.
///
/// Only a hosted index is tracked in the ledger under `<data-dir>/index/`.
/// The memory backend lives for this process alone, so it is filled in full
/// and the ledger is left untouched.
pub fn index_chunks(
    settings: &Settings,
    chunks: &ChunkStore,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    force: bool,
    batch_size: usize,
    updated_at: String,
) -> Result<IndexReport, AppError> {
    match settings.vector_backend {
        VectorBackend::Memory => {
            if chunks.is_empty() {
                return Err(AppError::new(
                    "INDEX_NO_CHUNKS",
                    "No chunks available; fetch filings before building the index",
                ));
            }
            warn!("memory backend keeps vectors for this process only; the index ledger is not updated");
            let all = chunks.chunks().iter().collect::<Vec<_>>();
            let upserted = embed_and_upsert(&all, embedder, store, &settings.embed_model, batch_size)?;
            Ok(IndexReport {
                backend: VectorBackend::Memory,
                upserted,
                ledger: None,
            })
        }
        VectorBackend::Pinecone => {
            let status = IndexLedger::open(settings.data_dir.clone()).build(
                chunks,
                embedder,
                store,
                IndexBuildInput {
                    model: settings.embed_model.clone(),
                    index_name: settings.index_name.clone(),
                    batch_size,
                    force,
                    updated_at,
                },
            )?;
            Ok(IndexReport {
                backend: VectorBackend::Pinecone,
                upserted: status.upserted_last_build as usize,
                ledger: Some(status),
            })
        }
    }
}
