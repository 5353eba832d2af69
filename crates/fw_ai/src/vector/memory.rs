use std::collections::BTreeMap;
use std::sync::RwLock;

use fw_core::error::AppError;

use super::similarity::{cosine_similarity, l2_norm};
use super::{check_dimension, rank_matches, IndexStats, RetrievalMatch, VectorRecord, VectorStore};
use crate::evidence::ChunkMetadata;

/// Exact cosine scan over an in-process map. Lives for the process only.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dimension: usize,
    records: RwLock<BTreeMap<String, (Vec<f32>, ChunkMetadata)>>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    fn poisoned() -> AppError {
        AppError::new("VECTOR_STORE_FAILED", "In-memory vector store lock poisoned")
    }
}

impl VectorStore for MemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, records: &[VectorRecord]) -> Result<usize, AppError> {
        for r in records {
            check_dimension(self.dimension, r.values.len(), &format!("id={}", r.id))?;
        }
        let mut map = self.records.write().map_err(|_| Self::poisoned())?;
        for r in records {
            map.insert(r.id.clone(), (r.values.clone(), r.metadata.clone()));
        }
        Ok(records.len())
    }

    fn query(&self, vector: &[f32], top_k: u32) -> Result<Vec<RetrievalMatch>, AppError> {
        check_dimension(self.dimension, vector.len(), "query")?;
        let qnorm = l2_norm(vector);
        if qnorm == 0.0 {
            return Ok(Vec::new());
        }

        let map = self.records.read().map_err(|_| Self::poisoned())?;
        let mut hits = Vec::with_capacity(map.len());
        for (id, (values, metadata)) in map.iter() {
            let vnorm = l2_norm(values);
            if vnorm == 0.0 {
                continue;
            }
            hits.push(RetrievalMatch {
                chunk_id: id.clone(),
                score: cosine_similarity(vector, values, qnorm, vnorm),
                metadata: Some(metadata.clone()),
            });
        }

        rank_matches(&mut hits);
        hits.truncate(top_k as usize);
        Ok(hits)
    }

    fn delete(&self, ids: &[String]) -> Result<(), AppError> {
        let mut map = self.records.write().map_err(|_| Self::poisoned())?;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    fn describe(&self) -> Result<IndexStats, AppError> {
        let map = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(IndexStats {
            dimension: self.dimension,
            vector_count: map.len() as u64,
        })
    }
}
