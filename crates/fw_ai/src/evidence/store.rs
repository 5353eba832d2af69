use std::collections::HashMap;
use std::fs;
use std::path::Path;

use fw_core::error::AppError;
use fw_core::filing::parse_filing_filename;
use tracing::{info, warn};

use super::chunking::{chunk_filing, ChunkParams};
use super::model::Chunk;

/// Resolves chunk text by id. Vector matches carry ids only.
pub trait ChunkLookup {
    fn chunk_text(&self, chunk_id: &str) -> Option<&str>;
}

impl ChunkLookup for HashMap<String, String> {
    fn chunk_text(&self, chunk_id: &str) -> Option<&str> {
        self.get(chunk_id).map(String::as_str)
    }
}

/// In-memory chunk list for every filing in a directory, built once at
/// startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
    filings: usize,
}

impl ChunkStore {
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let mut by_id = HashMap::with_capacity(chunks.len());
        for (i, c) in chunks.iter().enumerate() {
            if by_id.insert(c.chunk_id.clone(), i).is_some() {
                warn!(chunk_id = %c.chunk_id, "duplicate chunk id; later filing wins");
            }
        }
        let filings = {
            let mut files = chunks
                .iter()
                .map(|c| c.metadata.source_file.as_str())
                .collect::<Vec<_>>();
            files.sort_unstable();
            files.dedup();
            files.len()
        };
        Self {
            chunks,
            by_id,
            filings,
        }
    }

    /// Chunk every `.txt` file in `dir`, in file-name order.
    pub fn load_dir(dir: &Path, params: ChunkParams) -> Result<Self, AppError> {
        if !dir.is_dir() {
            return Err(AppError::new("CHUNK_SOURCE_DIR_NOT_FOUND", "Filings text directory not found")
                .with_details(format!("path={}", dir.display())));
        }

        let entries = fs::read_dir(dir)
            .map_err(|e| AppError::io("CHUNK_SOURCE_READ_FAILED", "Failed to list filings directory", dir, &e))?;
        let mut names = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.ends_with(".txt"))
            .collect::<Vec<_>>();
        names.sort();

        let mut chunks = Vec::new();
        for name in names.iter() {
            let path = dir.join(name);
            let raw = fs::read(&path)
                .map_err(|e| AppError::io("CHUNK_SOURCE_READ_FAILED", "Failed to read filing text", &path, &e))?;
            let meta = parse_filing_filename(name);
            chunks.extend(chunk_filing(&meta, &String::from_utf8_lossy(&raw), params));
        }

        let store = Self::from_chunks(chunks);
        info!(
            filings = names.len(),
            chunks = store.len(),
            dir = %dir.display(),
            "generated chunks"
        );
        Ok(store)
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.by_id.get(chunk_id).map(|&i| &self.chunks[i])
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of distinct source files that produced at least one chunk.
    pub fn filing_count(&self) -> usize {
        self.filings
    }
}

impl ChunkLookup for ChunkStore {
    fn chunk_text(&self, chunk_id: &str) -> Option<&str> {
        self.get(chunk_id).map(|c| c.text.as_str())
    }
}
