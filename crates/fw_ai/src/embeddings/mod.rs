use fw_core::error::AppError;

/// Output width of all-MiniLM-L6-v2, and of the hosted index.
pub const EMBEDDING_DIMS: usize = 384;
pub const DEFAULT_EMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

pub trait Embedder: Send + Sync {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;

    /// One vector per input, in input order.
    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        inputs.iter().map(|input| self.embed(model, input)).collect()
    }
}

pub mod http_embed;
