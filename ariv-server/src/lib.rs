pub mod logging;
pub mod routes;
pub mod state;

pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full axum router: health, models, chat, and eval, plus the
/// ambient CORS/trace/request-logging layers.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::models::router(state.clone()))
        .merge(routes::chat::router(state.clone()))
        .merge(routes::eval::router(state))
        .layer(axum::middleware::from_fn(logging::request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
