use fw_core::error::AppError;
use tracing::info;

use crate::answer::{AnswerAgent, AnswerResult};
use crate::evidence::ChunkStore;
use crate::retrieve::Retriever;

/// Retriever + answer agent over a chunk lookup built once at startup.
pub struct RagPipeline {
    chunks: ChunkStore,
    retriever: Retriever,
    agent: AnswerAgent,
}

impl RagPipeline {
    pub fn new(chunks: ChunkStore, retriever: Retriever, agent: AnswerAgent) -> Self {
        info!(
            chunks = chunks.len(),
            filings = chunks.filing_count(),
            top_k = retriever.top_k(),
            "pipeline ready"
        );
        Self {
            chunks,
            retriever,
            agent,
        }
    }

    pub fn ask(&self, question: &str) -> Result<AnswerResult, AppError> {
        let matches = self.retriever.retrieve(question)?;
        self.agent.answer(question, &matches, &self.chunks)
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}
