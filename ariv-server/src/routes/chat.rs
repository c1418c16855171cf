//! `POST /v1/chat` (§4.F) — streamed chat completion over the resident manager.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;

use ariv_common::{ArivError, Result};
use ariv_core::router;
use ariv_core::runner::ChatParams;

use crate::logging::RoutedModel;
use crate::state::AppState;

const BENCH_DEFAULT_MAX_TOKENS: u32 = 256;
const BENCH_DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[allow(dead_code)]
    user_id: String,
    text: String,
    #[serde(default)]
    preferred_lang: Option<String>,
    #[serde(default)]
    task_hint: Option<String>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    let hardware = state.probe.probe();

    let decision = router::choose(
        &hardware,
        request.preferred_lang.as_deref(),
        request.task_hint.as_deref(),
        &request.text,
        |name| state.registry.get(name).ok(),
    )
    .ok_or_else(|| ArivError::NotFound("no candidate model registered for this request".to_string()))?;

    let evicted = state.manager.touch(&decision.model.name).await;

    let metadata_line = format!(
        "{}\n",
        json!({
            "metadata": {
                "model": decision.model.name,
                "vram_used": decision.estimated_vram_mb,
                "fallback": decision.fallback.clone().unwrap_or_default(),
                "evicted": evicted,
                "reason": decision.reason,
            }
        })
    );

    let params = ChatParams {
        model_path: decision
            .model
            .local_path
            .clone()
            .unwrap_or_else(|| decision.model.name.clone()),
        prompt: request.text,
        num_gpu_layers: decision.num_gpu_layers,
        max_tokens: BENCH_DEFAULT_MAX_TOKENS,
        temperature: BENCH_DEFAULT_TEMPERATURE,
        path_user_visible: false,
    };

    let session = state.runner.stream(params).await?;

    let metadata_stream = stream::once(async move { Ok::<Bytes, Infallible>(Bytes::from(metadata_line)) });
    let token_stream = tokio_stream::StreamExt::map_while(ReceiverStream::new(session.tokens), |item| match item {
        Ok(token) => Some(Ok::<Bytes, Infallible>(Bytes::from(token))),
        Err(e) => {
            // The metadata envelope (and 200 status) is already on the wire;
            // a mid-stream failure can only end the body early and log.
            tracing::error!(error = %e, "runtime failure mid-stream");
            None
        }
    });

    let body = Body::from_stream(metadata_stream.chain(token_stream));

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        body,
    )
        .into_response();
    response.extensions_mut().insert(RoutedModel {
        model: decision.model.name.clone(),
        task: decision.model.task.clone(),
    });
    Ok(response)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat", post(chat))
        .with_state(state)
}
