use fw_core::error::AppError;
use tracing::{debug, warn};

use crate::embeddings::Embedder;
use crate::vector::{rank_matches, RetrievalMatch, VectorStore};

pub const DEFAULT_TOP_K: u32 = 5;
const MAX_TOP_K: u32 = 50;

/// Question → embedding → top-k chunk ids with scores and metadata.
pub struct Retriever {
    embedder: Box<dyn Embedder>,
    store: Box<dyn VectorStore>,
    model: String,
    top_k: u32,
}

impl Retriever {
    pub fn new(embedder: Box<dyn Embedder>, store: Box<dyn VectorStore>, model: impl Into<String>) -> Self {
        Self {
            embedder,
            store,
            model: model.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k.clamp(1, MAX_TOP_K);
        self
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    /// Rank stored chunks against `question`.
    ///
    /// An empty or unreachable index yields no matches rather than an error;
    /// embedding failures and dimension mismatches are returned.
    pub fn retrieve(&self, question: &str) -> Result<Vec<RetrievalMatch>, AppError> {
        let q = question.trim();
        if q.is_empty() {
            return Err(AppError::new("RETRIEVAL_QUERY_EMPTY", "Question must not be empty"));
        }

        let qv = self.embedder.embed(&self.model, q)?;
        let dims = self.store.dimension();
        if qv.len() != dims {
            return Err(AppError::new(
                "RETRIEVAL_DIMENSION_MISMATCH",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
        }

        let mut matches = match self.store.query(&qv, self.top_k) {
            Ok(m) => m,
            Err(error) => {
                warn!(%error, "vector index query failed; continuing with no matches");
                return Ok(Vec::new());
            }
        };
        rank_matches(&mut matches);
        matches.truncate(self.top_k as usize);
        debug!(
            matches = matches.len(),
            top_score = matches.first().map(|m| m.score).unwrap_or_default(),
            "retrieved chunks"
        );
        Ok(matches)
    }
}
