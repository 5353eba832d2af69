use fw_ai::embeddings::Embedder;
use fw_ai::retrieve::Retriever;
use fw_ai::vector::{IndexStats, MemoryVectorStore, RetrievalMatch, VectorRecord, VectorStore};
use fw_core::error::AppError;
use fw_core::filing::parse_filing_filename;

const TERMS: [&str; 3] = ["revenue", "dividend", "director"];

/// One dimension per term: how often it occurs.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let lower = input.to_lowercase();
        Ok(TERMS.iter().map(|t| lower.matches(t).count() as f32).collect())
    }
}

struct UnreachableStore;

impl VectorStore for UnreachableStore {
    fn dimension(&self) -> usize {
        3
    }
    fn upsert(&self, _records: &[VectorRecord]) -> Result<usize, AppError> {
        Err(AppError::new("VECTOR_REQUEST_FAILED", "unreachable").with_retryable(true))
    }
    fn query(&self, _vector: &[f32], _top_k: u32) -> Result<Vec<RetrievalMatch>, AppError> {
        Err(AppError::new("VECTOR_REQUEST_FAILED", "unreachable").with_retryable(true))
    }
    fn delete(&self, _ids: &[String]) -> Result<(), AppError> {
        Err(AppError::new("VECTOR_REQUEST_FAILED", "unreachable").with_retryable(true))
    }
    fn describe(&self) -> Result<IndexStats, AppError> {
        Err(AppError::new("VECTOR_REQUEST_FAILED", "unreachable"))
    }
}

fn seeded_store() -> MemoryVectorStore {
    let store = MemoryVectorStore::new(3);
    let meta = parse_filing_filename("BKH_10-K_2009-03-02.txt");
    let records = [
        ("BKH_10-K_2009-03-02_0", "revenue revenue rose"),
        ("BKH_10-K_2009-03-02_1", "dividend declared; revenue flat"),
        ("BKH_10-K_2009-03-02_2", "director compensation plan for each director"),
    ]
    .into_iter()
    .map(|(id, text)| VectorRecord {
        id: id.to_string(),
        values: KeywordEmbedder.embed("mock", text).unwrap(),
        metadata: meta.clone(),
    })
    .collect::<Vec<_>>();
    store.upsert(&records).expect("upsert");
    store
}

#[test]
fn ranks_by_cosine_and_honours_top_k() {
    let retriever = Retriever::new(Box::new(KeywordEmbedder), Box::new(seeded_store()), "mock").with_top_k(2);
    let hits = retriever.retrieve("How did revenue change?").expect("retrieve");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, "BKH_10-K_2009-03-02_0");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert_eq!(hits[1].chunk_id, "BKH_10-K_2009-03-02_1");
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].metadata.as_ref().map(|m| m.ticker.as_str()), Some("BKH"));
}

#[test]
fn default_top_k_is_five_and_is_clamped() {
    let r = Retriever::new(Box::new(KeywordEmbedder), Box::new(seeded_store()), "mock");
    assert_eq!(r.top_k(), 5);
    let r = r.with_top_k(0);
    assert_eq!(r.top_k(), 1);
    let r = r.with_top_k(1000);
    assert_eq!(r.top_k(), 50);
}

#[test]
fn empty_index_yields_no_matches() {
    let retriever = Retriever::new(Box::new(KeywordEmbedder), Box::new(MemoryVectorStore::new(3)), "mock");
    assert!(retriever.retrieve("revenue").expect("retrieve").is_empty());
}

#[test]
fn unreachable_index_yields_no_matches() {
    let retriever = Retriever::new(Box::new(KeywordEmbedder), Box::new(UnreachableStore), "mock");
    assert!(retriever.retrieve("revenue").expect("retrieve").is_empty());
}

#[test]
fn blank_question_is_rejected() {
    let retriever = Retriever::new(Box::new(KeywordEmbedder), Box::new(seeded_store()), "mock");
    let err = retriever.retrieve("  \n ").expect_err("blank");
    assert_eq!(err.code, "RETRIEVAL_QUERY_EMPTY");
}

#[test]
fn embedding_width_must_match_index() {
    let retriever = Retriever::new(Box::new(KeywordEmbedder), Box::new(MemoryVectorStore::new(384)), "mock");
    let err = retriever.retrieve("revenue").expect_err("dims");
    assert_eq!(err.code, "RETRIEVAL_DIMENSION_MISMATCH");
}
