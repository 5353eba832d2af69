use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use fw_core::error::AppError;
use fw_core::fsutil::write_atomic;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::vector::{VectorRecord, VectorStore};

use super::model::Chunk;
use super::store::ChunkStore;

pub const DEFAULT_EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub index_name: Option<String>,
    pub dims: Option<u32>,
    /// Chunks currently recorded as upserted.
    pub chunk_count: u32,
    /// Chunks available locally at the last build.
    pub chunks_total: u32,
    #[serde(default)]
    pub upserted_last_build: u32,
    pub updated_at: Option<String>,
}

impl IndexStatus {
    fn empty() -> Self {
        Self {
            ready: false,
            model: None,
            index_name: None,
            dims: None,
            chunk_count: 0,
            chunks_total: 0,
            upserted_last_build: 0,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBuildInput {
    pub model: String,
    pub index_name: String,
    pub batch_size: usize,
    /// Re-embed and re-upsert every chunk, ignoring recorded hashes.
    pub force: bool,
    pub updated_at: String,
}

/// Local record of what has been pushed to the hosted index: build status
/// plus `chunk_id -> text_sha256`, so unchanged chunks are not re-embedded.
#[derive(Debug, Clone)]
pub struct IndexLedger {
    root: PathBuf,
}

impl IndexLedger {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn status_path(&self) -> PathBuf {
        self.index_dir().join("index_status.json")
    }

    fn hashes_path(&self) -> PathBuf {
        self.index_dir().join("index_hashes.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        let dir = self.index_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::io("INDEX_BUILD_FAILED", "Failed to create index directory", &dir, &e))
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        let path = self.status_path();
        if !path.exists() {
            return Ok(IndexStatus::empty());
        }
        read_json(&path, "index status")
    }

    pub fn read_hashes(&self) -> Result<BTreeMap<String, String>, AppError> {
        let path = self.hashes_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&path, "index hashes")
    }

    /// Embed and upsert every chunk whose text changed since the last
    /// compatible build: same model, same index, and a store still holding at
    /// least as many vectors as the ledger recorded. Vectors of chunks that
    /// are no longer on disk are deleted from the store.
    ///
    /// Status and hashes of new chunks are written only after all upserts
    /// succeed, so a failed run leaves the previous state in place and is
    /// simply repeated.
    pub fn build(
        &self,
        chunks: &ChunkStore,
        embedder: &dyn Embedder,
        store: &dyn VectorStore,
        input: IndexBuildInput,
    ) -> Result<IndexStatus, AppError> {
        self.ensure_dirs()?;
        if chunks.is_empty() {
            return Err(AppError::new(
                "INDEX_NO_CHUNKS",
                "No chunks available; fetch filings before building the index",
            ));
        }

        let previous = self.status()?;
        let mut recorded = self.read_hashes()?;
        let same_index = previous.index_name.as_deref() == Some(input.index_name.as_str());

        // A store holding fewer vectors than the ledger recorded was reset or
        // replaced (fresh index, other backend); its hashes prove nothing.
        let held = store.describe()?.vector_count;
        let intact = held >= recorded.len() as u64;
        if same_index && previous.ready && !intact {
            warn!(
                index = %input.index_name,
                recorded = recorded.len(),
                held,
                "vector index holds fewer vectors than recorded; re-embedding everything"
            );
        }
        let compatible = !input.force
            && previous.ready
            && intact
            && previous.model.as_deref() == Some(input.model.as_str())
            && same_index;

        let wanted: BTreeSet<&str> = chunks.chunks().iter().map(|c| c.chunk_id.as_str()).collect();
        let stale: Vec<String> = if same_index {
            recorded
                .keys()
                .filter(|k| !wanted.contains(k.as_str()))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        if !stale.is_empty() {
            info!(stale = stale.len(), "removing vectors of chunks no longer on disk");
            store.delete(&stale)?;
            recorded.retain(|k, _| wanted.contains(k.as_str()));
            write_json_atomic(&self.hashes_path(), &recorded, "index hashes")?;
        }

        let mut hashes = if compatible { recorded } else { BTreeMap::new() };
        hashes.retain(|k, _| wanted.contains(k.as_str()));

        let pending: Vec<&Chunk> = chunks
            .chunks()
            .iter()
            .filter(|c| hashes.get(&c.chunk_id) != Some(&c.text_sha256))
            .collect();
        info!(
            total = chunks.len(),
            pending = pending.len(),
            index = %input.index_name,
            "building vector index"
        );

        let dims = store.dimension();
        let upserted = embed_and_upsert(&pending, embedder, store, &input.model, input.batch_size)?;

        for c in chunks.chunks() {
            hashes.insert(c.chunk_id.clone(), c.text_sha256.clone());
        }
        write_json_atomic(&self.hashes_path(), &hashes, "index hashes")?;

        let status = IndexStatus {
            ready: true,
            model: Some(input.model),
            index_name: Some(input.index_name),
            dims: u32::try_from(dims).ok(),
            chunk_count: to_u32(hashes.len()),
            chunks_total: to_u32(chunks.len()),
            upserted_last_build: to_u32(upserted),
            updated_at: Some(input.updated_at),
        };
        write_json_atomic(&self.status_path(), &status, "index status")?;
        info!(upserted, total = chunks.len(), "vector index build finished");
        Ok(status)
    }
}

/// Embed `chunks` in batches and upsert them with their metadata.
///
/// Every vector must match the store's dimension. Returns the number of
/// records sent.
pub fn embed_and_upsert(
    chunks: &[&Chunk],
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    model: &str,
    batch_size: usize,
) -> Result<usize, AppError> {
    let dims = store.dimension();
    let mut upserted = 0usize;
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts = batch.iter().map(|c| c.text.as_str()).collect::<Vec<_>>();
        let vectors = embedder.embed_batch(model, &texts).map_err(|e| {
            AppError::new("EMBEDDINGS_FAILED", "Failed to compute embeddings")
                .with_details(format!("first_chunk_id={}; err={}", batch[0].chunk_id, e))
                .with_retryable(e.retryable)
        })?;
        if vectors.len() != batch.len() {
            return Err(AppError::new("INDEX_BUILD_FAILED", "Embedder returned wrong number of vectors")
                .with_details(format!("expected={}; got={}", batch.len(), vectors.len())));
        }

        let mut records = Vec::with_capacity(batch.len());
        for (chunk, values) in batch.iter().zip(vectors) {
            if values.len() != dims {
                return Err(AppError::new(
                    "INDEX_BUILD_FAILED",
                    "Embedding dimension does not match index",
                )
                .with_details(format!("expected={dims}; got={}; chunk_id={}", values.len(), chunk.chunk_id)));
            }
            records.push(VectorRecord {
                id: chunk.chunk_id.clone(),
                values,
                metadata: chunk.metadata.clone(),
            });
        }
        store.upsert(&records)?;
        upserted += records.len();
    }
    Ok(upserted)
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::io("INDEX_BUILD_FAILED", format!("Failed to read {what}"), path, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", format!("Failed to encode {what}")).with_details(e.to_string())
    })?;
    write_atomic(path, json.as_bytes(), "INDEX_BUILD_FAILED", what)
}
