use std::sync::{Arc, Mutex, OnceLock};

use ariv_core::{AppConfig, Registry};
use ariv_server::{build_router, AppState};
use bytes::Bytes;
use http::StatusCode;
use tower::ServiceExt;

const FAKE_VRAM_ENV: &str = "ARIV_FAKE_VRAM_MB";

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// The sandbox running these tests has no GPU, so the probe reports
/// `vram_mb=0` unless overridden — which would downgrade every routing
/// decision to the safety net. Tests that need a nonzero VRAM budget hold
/// this guard for the duration of the request.
struct FakeVram<'a>(std::sync::MutexGuard<'a, ()>);

impl Drop for FakeVram<'_> {
    fn drop(&mut self) {
        std::env::remove_var(FAKE_VRAM_ENV);
    }
}

fn with_fake_vram_mb(mb: u64) -> FakeVram<'static> {
    let guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var(FAKE_VRAM_ENV, mb.to_string());
    FakeVram(guard)
}

const SAMPLE_REGISTRY: &str = r#"
models:
  llama-3.2-1b-q4_k_m:
    vram_mb: 1500
    task: general
    fallback: []
  qwen-2.5-3b-q4_k_m:
    vram_mb: 3500
    task: code
    fallback: [llama-3.2-1b-q4_k_m]
  sarvam-2b-q4_k_m:
    vram_mb: 4000
    task: indic
    fallback: [llama-3.2-1b-q4_k_m]
"#;

fn test_state() -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.runner.mock = true;
    let registry = Registry::from_yaml_str(SAMPLE_REGISTRY).unwrap();
    Arc::new(AppState::new(config, registry))
}

async fn send_request(
    app: &axum::Router,
    method: http::Method,
    uri: &str,
    body: Option<Bytes>,
) -> StatusCode {
    let (status, _) = send_request_body(app, method, uri, body).await;
    status
}

async fn send_request_body(
    app: &axum::Router,
    method: http::Method,
    uri: &str,
    body: Option<Bytes>,
) -> (StatusCode, Bytes) {
    let mut req_builder = http::Request::builder().method(method).uri(uri);
    if body.is_some() {
        req_builder = req_builder.header("Content-Type", "application/json");
    }
    let req = req_builder
        .body(if let Some(b) = body {
            axum::body::Body::from(b)
        } else {
            axum::body::Body::empty()
        })
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

fn metadata_line(body: &Bytes) -> serde_json::Value {
    let text = String::from_utf8_lossy(body);
    let first_line = text.lines().next().expect("body has at least one line");
    serde_json::from_str(first_line).expect("first line is valid JSON")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = build_router(test_state());
    let status = send_request(&app, http::Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn models_endpoint_lists_registry_entries() {
    let state = test_state();
    let app = build_router(state);
    let status = send_request(&app, http::Method::GET, "/v1/models", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn chat_endpoint_streams_mock_tokens() {
    let app = build_router(test_state());
    let body = Bytes::from(r#"{"user_id":"u1","text":"hello world"}"#);
    let status = send_request(&app, http::Method::POST, "/v1/chat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn eval_endpoint_requires_at_least_one_model() {
    let app = build_router(test_state());
    let body = Bytes::from(r#"{"models":[],"lang":"hi","subset":"dev"}"#);
    let status = send_request(&app, http::Method::POST, "/v1/eval", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nonexistent_route_returns_404() {
    let app = build_router(test_state());
    let status = send_request(&app, http::Method::GET, "/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metadata_envelope_precedes_any_token() {
    let app = build_router(test_state());
    let body = Bytes::from(r#"{"user_id":"u1","text":"hello world"}"#);
    let (status, body) = send_request_body(&app, http::Method::POST, "/v1/chat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let meta = metadata_line(&body);
    assert!(meta.get("metadata").is_some());
}

#[tokio::test]
async fn indic_text_routes_to_sarvam() {
    let _vram = with_fake_vram_mb(8000);
    let app = build_router(test_state());
    let body = Bytes::from(r#"{"user_id":"u1","text":"नमस्ते","preferred_lang":"hi"}"#);
    let (status, body) = send_request_body(&app, http::Method::POST, "/v1/chat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let meta = metadata_line(&body);
    let model = meta["metadata"]["model"].as_str().unwrap();
    assert!(model.starts_with("sarvam"), "model was {model}");
}

#[tokio::test]
async fn code_hint_routes_to_qwen() {
    let _vram = with_fake_vram_mb(8000);
    let app = build_router(test_state());
    let body = Bytes::from(r#"{"user_id":"u1","text":"def add(a,b):","task_hint":"code"}"#);
    let (status, body) = send_request_body(&app, http::Method::POST, "/v1/chat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let meta = metadata_line(&body);
    let model = meta["metadata"]["model"].as_str().unwrap();
    assert!(model.starts_with("qwen"), "model was {model}");
}

#[tokio::test]
async fn vram_downgrade_surfaces_fallback_in_metadata() {
    let yaml = r#"
models:
  llama-3.2-1b-q4_k_m:
    vram_mb: 1500
    task: general
    fallback: []
  sarvam-2b-q4_k_m:
    vram_mb: 8000
    task: indic
    fallback: [llama-3.2-1b-q4_k_m]
"#;
    let mut config = AppConfig::default();
    config.runner.mock = true;
    let state = Arc::new(AppState::new(config, Registry::from_yaml_str(yaml).unwrap()));
    let app = build_router(state);

    let body = Bytes::from(r#"{"user_id":"u1","text":"text","preferred_lang":"hi"}"#);
    let (status, body) = send_request_body(&app, http::Method::POST, "/v1/chat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let meta = metadata_line(&body);
    assert_eq!(meta["metadata"]["model"], "llama-3.2-1b-q4_k_m");
    assert_eq!(meta["metadata"]["fallback"], "sarvam-2b-q4_k_m");
}

#[tokio::test]
async fn lru_eviction_surfaces_to_chat_metadata() {
    let yaml = r#"
models:
  llama-3.2-1b-q4_k_m:
    vram_mb: 100
    task: general
    fallback: []
"#;
    let mut config = AppConfig::default();
    config.runner.mock = true;
    config.resident.max_loaded = 1;
    let state = Arc::new(AppState::new(config, Registry::from_yaml_str(yaml).unwrap()));

    // Pre-load a different name so the chat request's touch evicts it.
    state.manager.touch("someone-elses-model").await;

    let app = build_router(state);
    let body = Bytes::from(r#"{"user_id":"u1","text":"hello"}"#);
    let (status, body) = send_request_body(&app, http::Method::POST, "/v1/chat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let meta = metadata_line(&body);
    assert_eq!(
        meta["metadata"]["evicted"],
        serde_json::json!(["someone-elses-model"])
    );
}
