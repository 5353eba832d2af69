use std::time::Duration;

use fw_core::error::AppError;
use fw_core::normalize::text::truncate_on_char_boundary;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::hosted::{upstream_error, ServiceEndpoint};

// MiniLM truncates at 256 word pieces; anything far beyond that is wasted upload.
const MAX_INPUT_BYTES: usize = 12_000;

/// Client for an OpenAI-compatible `/embeddings` endpoint, as served by
/// text-embeddings-inference, Ollama or vLLM in front of a
/// sentence-transformers model.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

impl HttpEmbedder {
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl Embedder for HttpEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let mut out = self.embed_batch(model, &[input])?;
        out.pop()
            .ok_or_else(|| AppError::new("EMBEDDINGS_FAILED", "Embeddings response was empty"))
    }

    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint.url("embeddings");
        let req = EmbeddingsRequest {
            model,
            input: inputs
                .iter()
                .map(|s| truncate_on_char_boundary(s, MAX_INPUT_BYTES))
                .collect(),
        };

        let resp = self
            .endpoint
            .bearer(ureq::post(&url).timeout(self.timeout))
            .send_json(&req)
            .map_err(|e| upstream_error("EMBEDDINGS_FAILED", "Failed to call embeddings endpoint", &url, e))?;

        let mut parsed: EmbeddingsResponse = resp.into_json().map_err(|e| {
            AppError::new("EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;

        if parsed.data.len() != inputs.len() {
            return Err(AppError::new(
                "EMBEDDINGS_FAILED",
                "Embeddings response count does not match inputs",
            )
            .with_details(format!("inputs={}; vectors={}", inputs.len(), parsed.data.len())));
        }
        parsed.data.sort_by_key(|item| item.index.unwrap_or(usize::MAX));

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for item in parsed.data {
            if item.embedding.is_empty() {
                return Err(AppError::new("EMBEDDINGS_FAILED", "Embeddings response was empty"));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}
