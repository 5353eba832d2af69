use serde::{Deserialize, Serialize};

/// Metadata stored next to every vector: ticker, form type, filing-date
/// token and source file name. Never the chunk text.
pub use fw_core::filing::FilingMeta as ChunkMetadata;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `TICKER_FORM_FILED_<ordinal>`
    pub chunk_id: String,
    pub ordinal: u32,
    pub text: String,
    pub word_count: u32,
    pub text_sha256: String,
    pub metadata: ChunkMetadata,
}
