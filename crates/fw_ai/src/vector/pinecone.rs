use std::thread;
use std::time::{Duration, Instant};

use fw_core::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{check_dimension, rank_matches, IndexStats, RetrievalMatch, VectorRecord, VectorStore};
use crate::embeddings::EMBEDDING_DIMS;
use crate::evidence::ChunkMetadata;
use crate::hosted::upstream_error;

pub const DEFAULT_INDEX_NAME: &str = "finwiser-sec-rag";
pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;
const DELETE_BATCH: usize = 1000;

#[derive(Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub dimension: usize,
    pub cloud: String,
    pub region: String,
    pub control_plane_url: String,
    pub timeout: Duration,
    /// How long `connect` waits for a freshly created index to become ready.
    pub ready_wait: Duration,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: index_name.into(),
            dimension: EMBEDDING_DIMS,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            control_plane_url: DEFAULT_CONTROL_PLANE_URL.to_string(),
            timeout: Duration::from_secs(15),
            ready_wait: Duration::from_secs(90),
        }
    }
}

impl std::fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("index_name", &self.index_name)
            .field("dimension", &self.dimension)
            .field("cloud", &self.cloud)
            .field("region", &self.region)
            .field("control_plane_url", &self.control_plane_url)
            .finish_non_exhaustive()
    }
}

/// Hosted Pinecone serverless index, cosine metric. Only metadata is stored
/// alongside vectors; chunk text stays local.
pub struct PineconeStore {
    api_key: String,
    index_name: String,
    dimension: usize,
    /// Data-plane base URL, e.g. `https://finwiser-sec-rag-abc123.svc.aped-4627-b74a.pinecone.io`.
    host: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexReadiness>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexReadiness {
    ready: bool,
}

#[derive(Debug, Clone, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: ServerlessSpecWrapper<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct ServerlessSpecWrapper<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Debug, Clone, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
}

impl PineconeStore {
    /// Resolve (creating when missing) the configured index.
    ///
    /// A blank API key fails before any network call.
    pub fn connect(cfg: PineconeConfig) -> Result<Self, AppError> {
        let api_key = cfg.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(AppError::new(
                "VECTOR_CREDENTIALS_MISSING",
                "PINECONE_API_KEY is not set",
            ));
        }
        let control = cfg.control_plane_url.trim_end_matches('/').to_string();

        let mut store = Self {
            api_key,
            index_name: cfg.index_name.clone(),
            dimension: cfg.dimension,
            host: String::new(),
            timeout: cfg.timeout,
        };

        let list_url = format!("{control}/indexes");
        let list: IndexList = store.call_json(ureq::get(&list_url), &list_url, None::<&()>)?;

        let mut model = match list.indexes.into_iter().find(|i| i.name == cfg.index_name) {
            Some(existing) => existing,
            None => {
                info!(index = %cfg.index_name, dimension = cfg.dimension, "creating vector index");
                let body = CreateIndexRequest {
                    name: &cfg.index_name,
                    dimension: cfg.dimension,
                    metric: "cosine",
                    spec: ServerlessSpecWrapper {
                        serverless: ServerlessSpec {
                            cloud: &cfg.cloud,
                            region: &cfg.region,
                        },
                    },
                };
                store.call_json(ureq::post(&list_url), &list_url, Some(&body))?
            }
        };

        check_dimension(cfg.dimension, model.dimension, &format!("index={}", cfg.index_name))?;

        let describe_url = format!("{control}/indexes/{}", cfg.index_name);
        let started = Instant::now();
        while !model.status.as_ref().map(|s| s.ready).unwrap_or(true) || model.host.is_none() {
            if started.elapsed() >= cfg.ready_wait {
                return Err(AppError::new("VECTOR_INDEX_NOT_READY", "Vector index did not become ready")
                    .with_details(format!("index={}; waited_secs={}", cfg.index_name, cfg.ready_wait.as_secs()))
                    .with_retryable(true));
            }
            thread::sleep(Duration::from_secs(1));
            model = store.call_json(ureq::get(&describe_url), &describe_url, None::<&()>)?;
        }

        let host = model.host.unwrap_or_default();
        store.host = if host.contains("://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{host}")
        };
        info!(index = %store.index_name, host = %store.host, "connected to vector index");
        Ok(store)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn call_json<T, B>(&self, req: ureq::Request, url: &str, body: Option<&B>) -> Result<T, AppError>
    where
        T: for<'de> Deserialize<'de>,
        B: Serialize,
    {
        let req = req
            .timeout(self.timeout)
            .set("Api-Key", &self.api_key)
            .set("X-Pinecone-API-Version", API_VERSION);
        let resp = match body {
            Some(b) => req.send_json(b),
            None => req.call(),
        }
        .map_err(|e| upstream_error("VECTOR_REQUEST_FAILED", "Vector index request failed", url, e))?;

        resp.into_json().map_err(|e| {
            AppError::new("VECTOR_REQUEST_FAILED", "Failed to decode vector index response")
                .with_details(format!("url={url}; err={e}"))
        })
    }
}

impl VectorStore for PineconeStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, records: &[VectorRecord]) -> Result<usize, AppError> {
        for r in records {
            check_dimension(self.dimension, r.values.len(), &format!("id={}", r.id))?;
        }
        let url = format!("{}/vectors/upsert", self.host);
        let mut written = 0usize;
        for batch in records.chunks(UPSERT_BATCH) {
            let resp: UpsertResponse =
                self.call_json(ureq::post(&url), &url, Some(&UpsertRequest { vectors: batch }))?;
            debug!(batch = batch.len(), upserted = resp.upserted_count, "upserted vectors");
            written += resp.upserted_count;
        }
        Ok(written)
    }

    fn query(&self, vector: &[f32], top_k: u32) -> Result<Vec<RetrievalMatch>, AppError> {
        check_dimension(self.dimension, vector.len(), "query")?;
        let url = format!("{}/query", self.host);
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let resp: QueryResponse = self.call_json(ureq::post(&url), &url, Some(&body))?;

        let mut matches = resp
            .matches
            .into_iter()
            .map(|m| RetrievalMatch {
                chunk_id: m.id,
                score: m.score,
                metadata: m
                    .metadata
                    .and_then(|v| serde_json::from_value::<ChunkMetadata>(v).ok()),
            })
            .collect::<Vec<_>>();
        rank_matches(&mut matches);
        matches.truncate(top_k as usize);
        Ok(matches)
    }

    fn delete(&self, ids: &[String]) -> Result<(), AppError> {
        let url = format!("{}/vectors/delete", self.host);
        for batch in ids.chunks(DELETE_BATCH) {
            let _: serde_json::Value =
                self.call_json(ureq::post(&url), &url, Some(&DeleteRequest { ids: batch }))?;
            debug!(batch = batch.len(), "deleted vectors");
        }
        Ok(())
    }

    fn describe(&self) -> Result<IndexStats, AppError> {
        let url = format!("{}/describe_index_stats", self.host);
        let resp: StatsResponse =
            self.call_json(ureq::post(&url), &url, Some(&serde_json::json!({})))?;
        Ok(IndexStats {
            dimension: if resp.dimension == 0 { self.dimension } else { resp.dimension },
            vector_count: resp.total_vector_count,
        })
    }
}
