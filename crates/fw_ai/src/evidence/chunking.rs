use fw_core::error::AppError;
use fw_core::normalize::text::clean_filing_text;
use sha2::{Digest, Sha256};

use super::model::{Chunk, ChunkMetadata};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Word-window parameters. `overlap < chunk_size` is enforced so the window
/// start always advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(AppError::new(
                "CHUNK_PARAMS_INVALID",
                "Chunk overlap must be smaller than a non-zero chunk size",
            )
            .with_details(format!("chunk_size={chunk_size}; overlap={overlap}")));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split `text` into overlapping windows of whitespace-separated words.
///
/// Window `n` starts at word `n * (chunk_size - overlap)`; the last window
/// may be short. A window is emitted for every start below the word count, so
/// the tail of one window is repeated at the head of the next.
pub fn chunk_words(text: &str, params: ChunkParams) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let end = (start + params.chunk_size).min(words.len());
        out.push(words[start..end].join(" "));
        start += params.stride();
    }
    out
}

/// Clean and chunk one filing's text, attaching ids and metadata.
pub fn chunk_filing(meta: &ChunkMetadata, raw_text: &str, params: ChunkParams) -> Vec<Chunk> {
    let cleaned = clean_filing_text(raw_text);
    let prefix = meta.chunk_id_prefix();

    chunk_words(&cleaned, params)
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let ordinal = u32::try_from(i).unwrap_or(u32::MAX);
            Chunk {
                chunk_id: format!("{prefix}_{i}"),
                ordinal,
                word_count: u32::try_from(text.split(' ').count()).unwrap_or(u32::MAX),
                text_sha256: hex::encode(Sha256::digest(text.as_bytes())),
                text,
                metadata: meta.clone(),
            }
        })
        .collect()
}
