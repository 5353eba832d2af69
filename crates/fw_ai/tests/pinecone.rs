use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fw_ai::vector::{PineconeConfig, PineconeStore, VectorRecord, VectorStore};
use fw_core::filing::parse_filing_filename;
use pretty_assertions::assert_eq;

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    api_key: Option<String>,
    body: String,
}

/// Loopback stand-in for both Pinecone planes. The index is reported
/// missing on list, so `connect` has to create it.
fn spawn_fake_pinecone() -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let host = base.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("read");
            let mut content_length = 0usize;
            let mut api_key = None;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.trim_end().split_once(':') {
                    let value = value.trim();
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.parse().unwrap_or(0);
                    } else if name.eq_ignore_ascii_case("api-key") {
                        api_key = Some(value.to_string());
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("body");

            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or("").to_string();
            let path = parts.next().unwrap_or("/").to_string();
            log.lock().unwrap().push(Seen {
                method: method.clone(),
                path: path.clone(),
                api_key,
                body: String::from_utf8_lossy(&body).into_owned(),
            });

            let reply = match (method.as_str(), path.as_str()) {
                ("GET", "/indexes") => r#"{"indexes":[]}"#.to_string(),
                ("POST", "/indexes") => format!(
                    r#"{{"name":"finwiser-test","dimension":3,"metric":"cosine","host":"{host}","status":{{"ready":true,"state":"Ready"}}}}"#
                ),
                ("POST", "/vectors/upsert") => r#"{"upsertedCount":2}"#.to_string(),
                ("POST", "/query") => r#"{"matches":[
                    {"id":"BKH_10-K_2009-03-02_1","score":0.5},
                    {"id":"BKH_10-K_2009-03-02_0","score":0.9,"metadata":{"ticker":"BKH","form_type":"10-K","filed_year":"2009-03-02","source_file":"BKH_10-K_2009-03-02.txt"}},
                    {"id":"BKH_10-K_2009-03-02_2","score":0.1,"metadata":{"unexpected":true}}
                ],"namespace":""}"#
                    .to_string(),
                ("POST", "/vectors/delete") => "{}".to_string(),
                ("POST", "/describe_index_stats") => r#"{"dimension":3,"totalVectorCount":2}"#.to_string(),
                _ => String::new(),
            };
            let status = if reply.is_empty() { "404 Not Found" } else { "200 OK" };
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            let _ = stream.write_all(resp.as_bytes());
        }
    });
    (base, seen)
}

fn config(base: &str) -> PineconeConfig {
    let mut cfg = PineconeConfig::new("test-key", "finwiser-test");
    cfg.dimension = 3;
    cfg.control_plane_url = base.to_string();
    cfg.timeout = Duration::from_secs(5);
    cfg.ready_wait = Duration::from_secs(5);
    cfg
}

#[test]
fn missing_api_key_fails_before_any_request() {
    let mut cfg = PineconeConfig::new("  ", "finwiser-test");
    cfg.control_plane_url = "http://127.0.0.1:9".to_string();
    let err = PineconeStore::connect(cfg).err().expect("missing key");
    assert_eq!(err.code, "VECTOR_CREDENTIALS_MISSING");
}

#[test]
fn config_debug_hides_api_key() {
    let cfg = PineconeConfig::new("pc-secret-value", "finwiser-test");
    assert!(!format!("{cfg:?}").contains("pc-secret-value"));
}

#[test]
fn creates_missing_index_then_upserts_and_queries() {
    let (base, seen) = spawn_fake_pinecone();
    let store = PineconeStore::connect(config(&base)).expect("connect");
    assert_eq!(store.index_name(), "finwiser-test");
    assert_eq!(store.dimension(), 3);

    let meta = parse_filing_filename("BKH_10-K_2009-03-02.txt");
    let written = store
        .upsert(&[
            VectorRecord {
                id: "BKH_10-K_2009-03-02_0".to_string(),
                values: vec![1.0, 0.0, 0.0],
                metadata: meta.clone(),
            },
            VectorRecord {
                id: "BKH_10-K_2009-03-02_1".to_string(),
                values: vec![0.0, 1.0, 0.0],
                metadata: meta.clone(),
            },
        ])
        .expect("upsert");
    assert_eq!(written, 2);

    let hits = store.query(&[1.0, 0.0, 0.0], 2).expect("query");
    let ids = hits.iter().map(|h| h.chunk_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["BKH_10-K_2009-03-02_0", "BKH_10-K_2009-03-02_1"]);
    assert_eq!(hits[0].metadata.as_ref(), Some(&meta));
    assert_eq!(hits[1].metadata, None);

    let stats = store.describe().expect("describe");
    assert_eq!(stats.vector_count, 2);

    store
        .delete(&["BKH_10-K_2009-03-02_1".to_string()])
        .expect("delete");

    let seen = seen.lock().unwrap().clone();
    let routes = seen
        .iter()
        .map(|s| format!("{} {}", s.method, s.path))
        .collect::<Vec<_>>();
    assert_eq!(
        routes,
        vec![
            "GET /indexes",
            "POST /indexes",
            "POST /vectors/upsert",
            "POST /query",
            "POST /describe_index_stats",
            "POST /vectors/delete",
        ]
    );
    assert!(seen.iter().all(|s| s.api_key.as_deref() == Some("test-key")));

    let create: serde_json::Value = serde_json::from_str(&seen[1].body).unwrap();
    assert_eq!(create["dimension"], 3);
    assert_eq!(create["metric"], "cosine");
    assert_eq!(create["spec"]["serverless"]["region"], "us-east-1");

    let query: serde_json::Value = serde_json::from_str(&seen[3].body).unwrap();
    assert_eq!(query["topK"], 2);
    assert_eq!(query["includeMetadata"], true);

    let delete: serde_json::Value = serde_json::from_str(&seen[5].body).unwrap();
    assert_eq!(delete["ids"], serde_json::json!(["BKH_10-K_2009-03-02_1"]));
}

#[test]
fn wrong_dimension_is_rejected_locally() {
    let (base, seen) = spawn_fake_pinecone();
    let store = PineconeStore::connect(config(&base)).expect("connect");
    let before = seen.lock().unwrap().len();

    let err = store.query(&[1.0, 0.0], 5).unwrap_err();
    assert_eq!(err.code, "VECTOR_DIMENSION_MISMATCH");
    assert_eq!(seen.lock().unwrap().len(), before);
}

#[test]
fn existing_index_with_other_dimension_is_rejected() {
    let (base, _seen) = spawn_fake_pinecone();
    let mut cfg = config(&base);
    // Fake creates a 3-dim index; asking for 4 must fail the check.
    cfg.dimension = 4;
    let err = PineconeStore::connect(cfg).err().expect("dims");
    assert_eq!(err.code, "VECTOR_DIMENSION_MISMATCH");
}
