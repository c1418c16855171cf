//! `GET /v1/models` (§4.F).

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub quant: String,
    pub vram_mb: String,
    pub local_path: String,
    pub task: String,
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, ModelEntry>> {
    let entries = state
        .registry
        .list()
        .map(|spec| {
            (
                spec.name.clone(),
                ModelEntry {
                    quant: spec.quant.clone(),
                    vram_mb: spec.vram_mb.to_string(),
                    local_path: spec.local_path.clone().unwrap_or_default(),
                    task: spec.task.clone(),
                },
            )
        })
        .collect();
    Json(entries)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/models", get(list_models))
        .with_state(state)
}
