use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Stamped onto a response's extensions by a route handler that made a
/// routing decision, so the logging middleware can surface it alongside the
/// request line without threading it through every handler's return type.
#[derive(Debug, Clone)]
pub struct RoutedModel {
    pub model: String,
    pub task: String,
}

/// Middleware that logs HTTP requests at INFO level, one line per request.
/// When the handler routed the request to a model (`POST /v1/chat`), that
/// model and task are logged alongside the usual method/path/status fields.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();
    let routed = response.extensions().get::<RoutedModel>().cloned();

    match routed {
        Some(RoutedModel { model, task }) => tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            model = %model,
            task = %task,
            "HTTP request"
        ),
        None => tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "HTTP request"
        ),
    }

    response
}
