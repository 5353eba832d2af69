pub mod chunking;
pub mod index;
pub mod model;
pub mod store;

pub use chunking::{chunk_filing, chunk_words, ChunkParams};
pub use index::{embed_and_upsert, IndexBuildInput, IndexLedger, IndexStatus, DEFAULT_EMBED_BATCH};
pub use model::{Chunk, ChunkMetadata};
pub use store::{ChunkLookup, ChunkStore};
