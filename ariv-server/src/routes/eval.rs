//! `POST /v1/eval` (§4.F) — runs the benchmark harness synchronously.

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use ariv_common::{ArivError, Result};
use ariv_core::BenchmarkHarness;

use crate::state::AppState;

const DATASET_PATH: &str = "benchmarks/data.jsonl";
const RESULTS_DIR: &str = "benchmarks/results";

#[derive(Debug, Deserialize)]
struct EvalRequest {
    models: Vec<String>,
    lang: String,
    subset: String,
}

#[derive(Debug, Serialize)]
struct EvalResponse {
    csv: String,
    md: String,
}

async fn eval(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvalRequest>,
) -> Result<Json<EvalResponse>> {
    if request.models.is_empty() {
        return Err(ArivError::NotFound("eval request named no models".to_string()));
    }
    let models = request
        .models
        .iter()
        .map(|name| {
            let spec = state.registry.get(name)?;
            let path = spec.local_path.clone().unwrap_or_else(|| spec.name.clone());
            Ok((spec.name.clone(), path))
        })
        .collect::<Result<Vec<_>>>()?;

    let harness = BenchmarkHarness::new(&state.runner);
    let (_results, csv_path, md_path) = harness
        .run(&models, DATASET_PATH, &request.lang, &request.subset, RESULTS_DIR)
        .await?;

    Ok(Json(EvalResponse {
        csv: csv_path.display().to_string(),
        md: md_path.display().to_string(),
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/eval", post(eval))
        .with_state(state)
}
