mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use sci_storm::config::{ExecutionConfig, SearchConfig};
use sci_storm::tools::search::{format_sources, NO_RESULTS_MESSAGE};
use sci_storm::tools::{interpret_result, ExecutionClient, SearchClient};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn search_config(base_url: &str) -> SearchConfig {
    SearchConfig {
        api_key: Some("tvly-test".to_string()),
        max_results: 2,
        base_url: base_url.to_string(),
        request_timeout: 5,
    }
}

#[derive(Clone, Default)]
struct SearchMock {
    api_keys: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn search_hits(State(mock): State<SearchMock>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        mock.api_keys.lock().unwrap().push(key.to_string());
    }
    mock.bodies.lock().unwrap().push(body);
    Json(json!({
        "results": [
            {"title": "Reef survey", "url": "https://example.org/reef", "content": "Bleaching rose 12%."},
            {"url": "https://example.org/untitled", "content": "No title here."}
        ]
    }))
}

#[tokio::test]
async fn test_search_collects_sources() {
    let mock = SearchMock::default();
    let app = Router::new()
        .route("/search", post(search_hits))
        .with_state(mock.clone());
    let base = common::spawn(app).await;

    let client = SearchClient::new(&search_config(&base));
    let result = client.search("coral bleaching").await;

    assert!(result.error.is_none());
    assert_eq!(result.query, "coral bleaching");
    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.sources[1].title, "untitled");
    assert_eq!(mock.api_keys.lock().unwrap().as_slice(), ["tvly-test"]);

    let body = mock.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["query"], "coral bleaching");
    assert_eq!(body["max_results"], 2);

    let evidence = format_sources(&result.sources);
    assert!(evidence.starts_with("- Reef survey (https://example.org/reef)\n  Bleaching rose 12%."));
}

#[tokio::test]
async fn test_search_failure_body_is_reported() {
    let app = Router::new().route(
        "/search",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
    );
    let base = common::spawn(app).await;

    let result = SearchClient::new(&search_config(&base)).search("q").await;
    assert!(result.sources.is_empty());
    assert_eq!(result.error.as_deref(), Some("Search failed: invalid api key"));
}

#[tokio::test]
async fn test_search_empty_results() {
    let app = Router::new().route("/search", post(|| async { Json(json!({"results": []})) }));
    let base = common::spawn(app).await;

    let result = SearchClient::new(&search_config(&base)).search("q").await;
    assert_eq!(result.error.as_deref(), Some(NO_RESULTS_MESSAGE));
}

fn execution_config(server_url: &str) -> ExecutionConfig {
    ExecutionConfig {
        server_url: server_url.to_string(),
        startup_command: None,
        handshake_path: "/health".to_string(),
        max_retries: 3,
        retry_backoff: 0.0,
        startup_grace_ms: 0,
        handshake_timeout: 2,
        request_timeout: 5,
    }
}

#[derive(Clone, Default)]
struct ExecutionMock {
    execute_hits: Arc<AtomicUsize>,
}

async fn flaky_execute(State(mock): State<ExecutionMock>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if mock.execute_hits.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"detail": "warming up"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "summary": format!("Tested: {}", body["hypothesis"].as_str().unwrap_or_default()),
            "stdout": "42",
            "stderr": ""
        })),
    )
}

#[tokio::test]
async fn test_experiment_retries_transient_failure() {
    let mock = ExecutionMock::default();
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/execute", post(flaky_execute))
        .with_state(mock.clone());
    let base = common::spawn(app).await;

    let client = ExecutionClient::new(execution_config(&base));
    assert!(client.handshake().await);

    let report = client.run_experiment("answer is 42", "print(42)").await.unwrap();
    assert_eq!(mock.execute_hits.load(Ordering::SeqCst), 2);
    assert_eq!(report.hypothesis, "answer is 42");
    assert!(!client.has_started_server().await);

    let rendered = interpret_result(&report.raw);
    assert_eq!(
        rendered,
        "### Execution Summary\nTested: answer is 42\n\n### Output\n42"
    );
}

#[tokio::test]
async fn test_failing_health_check_makes_experiment_unreachable() {
    let app = Router::new().route(
        "/health",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = common::spawn(app).await;

    let client = ExecutionClient::new(execution_config(&base));
    assert!(!client.handshake().await);

    let err = client.run_experiment("h", "code").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Unable to reach execution server at {} after startup.", base)
    );
}
