use fw_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::evidence::ChunkMetadata;

pub mod memory;
pub mod pinecone;
pub(crate) mod similarity;

pub use memory::MemoryVectorStore;
pub use pinecone::{PineconeConfig, PineconeStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One scored hit. Text is not part of the match; it is resolved locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalMatch {
    pub chunk_id: String,
    pub score: f32,
    pub metadata: Option<ChunkMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub dimension: usize,
    pub vector_count: u64,
}

/// Nearest-neighbour index holding `(id, vector, metadata)` records under
/// cosine similarity.
pub trait VectorStore: Send + Sync {
    fn dimension(&self) -> usize;

    /// Insert or replace records by id. Returns how many were written.
    fn upsert(&self, records: &[VectorRecord]) -> Result<usize, AppError>;

    /// Top `top_k` records by score, highest first.
    fn query(&self, vector: &[f32], top_k: u32) -> Result<Vec<RetrievalMatch>, AppError>;

    /// Remove records by id. Unknown ids are ignored.
    fn delete(&self, ids: &[String]) -> Result<(), AppError>;

    /// Dimension and record count as the index reports them.
    fn describe(&self) -> Result<IndexStats, AppError>;
}

pub(crate) fn check_dimension(expected: usize, got: usize, context: &str) -> Result<(), AppError> {
    if expected != got {
        return Err(AppError::new("VECTOR_DIMENSION_MISMATCH", "Vector dimension does not match index")
            .with_details(format!("{context}; expected={expected}; got={got}")));
    }
    Ok(())
}

/// Highest score first; equal scores fall back to id order.
pub(crate) fn rank_matches(matches: &mut [RetrievalMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}
