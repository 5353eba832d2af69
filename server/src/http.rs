use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fw_ai::answer::AnswerResult;
use fw_ai::pipeline::RagPipeline;
use fw_core::error::AppError;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ask", post(ask))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "finwiser listening");
    axum::serve(listener, router(state))
        .await
        .context("server shutdown")
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, ApiError> {
    let Json(request) = payload.map_err(rejected_body)?;
    let pipeline = Arc::clone(&state.pipeline);
    // Outbound calls are blocking ureq requests.
    let result = tokio::task::spawn_blocking(move || pipeline.ask(&request.question))
        .await
        .map_err(|e| {
            to_api_error(
                AppError::new("INTERNAL_TASK_FAILED", "Question task did not complete")
                    .with_details(e.to_string()),
            )
        })?;
    result.map(Json).map_err(to_api_error)
}

/// Blank input is the caller's fault; an unreachable or failing hosted
/// service is a bad gateway; anything else is ours.
pub fn status_for(err: &AppError) -> StatusCode {
    if err.is("RETRIEVAL_QUERY_EMPTY") {
        StatusCode::BAD_REQUEST
    } else if err.retryable
        || ["EMBEDDINGS_", "VECTOR_", "LLM_"]
            .iter()
            .any(|p| err.code.starts_with(p))
    {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Keep axum's status (400, 415 or 422) but answer with the usual error body.
fn rejected_body(rejection: JsonRejection) -> ApiError {
    let status = rejection.status();
    let details = rejection.body_text();
    warn!(%status, %details, "ask body rejected");
    (
        status,
        Json(ErrorBody {
            code: "REQUEST_INVALID".to_string(),
            message: r#"Request body must be JSON like {"question": "..."}"#.to_string(),
            details: Some(details),
        }),
    )
}

fn to_api_error(err: AppError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(%err, "ask failed");
    } else {
        warn!(%err, "ask rejected");
    }
    (
        status,
        Json(ErrorBody {
            code: err.code,
            message: err.message,
            details: err.details,
        }),
    )
}
