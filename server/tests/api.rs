use std::net::TcpListener;
use std::thread;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use finwiser_lib::client::ask_remote;
use finwiser_lib::http::{router, AppState, ErrorBody};
use fw_ai::answer::{AnswerAgent, AnswerResult};
use fw_ai::embeddings::Embedder;
use fw_ai::evidence::{chunk_filing, embed_and_upsert, ChunkParams, ChunkStore};
use fw_ai::guardrails::FALLBACK_ANSWER;
use fw_ai::llm::{ChatPrompt, Llm};
use fw_ai::pipeline::RagPipeline;
use fw_ai::retrieve::Retriever;
use fw_ai::vector::MemoryVectorStore;
use fw_core::error::AppError;
use fw_core::filing::parse_filing_filename;
use pretty_assertions::assert_eq;
use tower::ServiceExt;

const TERMS: [&str; 3] = ["revenue", "dividend", "director"];

struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let lower = input.to_lowercase();
        Ok(TERMS.iter().map(|t| lower.matches(t).count() as f32).collect())
    }
}

struct FixedLlm(Result<String, AppError>);

impl Llm for FixedLlm {
    fn generate(&self, _model: &str, _prompt: ChatPrompt<'_>) -> Result<String, AppError> {
        self.0.clone()
    }
}

fn pipeline(llm: FixedLlm, indexed: bool) -> RagPipeline {
    let meta = parse_filing_filename("BKH_10-K_2009-03-02.txt");
    let chunks = ChunkStore::from_chunks(chunk_filing(
        &meta,
        "Outside directors receive shares under the director plan.",
        ChunkParams::default(),
    ));
    let store = MemoryVectorStore::new(TERMS.len());
    if indexed {
        let all = chunks.chunks().iter().collect::<Vec<_>>();
        embed_and_upsert(&all, &KeywordEmbedder, &store, "mock", 8).unwrap();
    }
    let retriever = Retriever::new(Box::new(KeywordEmbedder), Box::new(store), "mock");
    RagPipeline::new(chunks, retriever, AnswerAgent::new(Box::new(llm), "mock"))
}

fn answering(text: &str) -> FixedLlm {
    FixedLlm(Ok(text.to_string()))
}

fn ask_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = router(AppState::new(pipeline(answering("unused"), false)));
    let resp = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn ask_returns_answer_and_sources() {
    let app = router(AppState::new(pipeline(
        answering("Each outside director receives shares [BKH_10-K_2009-03-02_0]."),
        true,
    )));
    let resp = app
        .oneshot(ask_request(r#"{"question":"What does the director plan provide?"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let out: AnswerResult = json_body(resp).await;
    assert_eq!(out.sources, vec!["BKH_10-K_2009-03-02_0".to_string()]);
    assert!(out.answer.starts_with("Each outside director"));
}

#[tokio::test]
async fn empty_index_answers_with_fallback() {
    let app = router(AppState::new(pipeline(answering("should not be called"), false)));
    let resp = app
        .oneshot(ask_request(r#"{"question":"What was revenue?"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let out: AnswerResult = json_body(resp).await;
    assert_eq!(out.answer, FALLBACK_ANSWER);
    assert!(out.sources.is_empty());
}

#[tokio::test]
async fn blank_question_is_bad_request() {
    let app = router(AppState::new(pipeline(answering("unused"), true)));
    let resp = app.oneshot(ask_request(r#"{"question":"   "}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let err: ErrorBody = json_body(resp).await;
    assert_eq!(err.code, "RETRIEVAL_QUERY_EMPTY");
}

#[tokio::test]
async fn malformed_body_gets_the_error_shape() {
    let app = router(AppState::new(pipeline(answering("unused"), true)));
    let resp = app.oneshot(ask_request("not json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let err: ErrorBody = json_body(resp).await;
    assert_eq!(err.code, "REQUEST_INVALID");
    assert!(err.details.is_some());
}

#[tokio::test]
async fn missing_question_field_gets_the_error_shape() {
    let app = router(AppState::new(pipeline(answering("unused"), true)));
    let resp = app.oneshot(ask_request("{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let err: ErrorBody = json_body(resp).await;
    assert_eq!(err.code, "REQUEST_INVALID");
    assert!(err.details.unwrap_or_default().contains("question"));
}

#[tokio::test]
async fn model_failure_is_bad_gateway() {
    let llm = FixedLlm(Err(
        AppError::new("LLM_REQUEST_FAILED", "Language model request failed").with_retryable(true)
    ));
    let app = router(AppState::new(pipeline(llm, true)));
    let resp = app
        .oneshot(ask_request(r#"{"question":"Who is a director?"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let err: ErrorBody = json_body(resp).await;
    assert_eq!(err.code, "LLM_REQUEST_FAILED");
}

#[test]
fn remote_client_round_trips_through_a_live_server() {
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let app = router(AppState::new(pipeline(
        answering("Directors receive shares [BKH_10-K_2009-03-02_0]."),
        true,
    )));
    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    let url = format!("http://{addr}/ask");
    let out = ask_remote(&url, "What do directors receive?").unwrap();
    assert_eq!(out.sources, vec!["BKH_10-K_2009-03-02_0".to_string()]);

    let err = ask_remote(&url, " ").unwrap_err();
    assert_eq!(err.code, "RETRIEVAL_QUERY_EMPTY");
    assert!(!err.retryable);
}

#[test]
fn remote_client_reports_unreachable_server() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let err = ask_remote(&format!("http://127.0.0.1:{port}/ask"), "anything").unwrap_err();
    assert_eq!(err.code, "API_UNREACHABLE");
    assert!(err.retryable);
}
