use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::handlers::AppState;

pub async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    state.metrics.record_response(status);
    if status.is_server_error() {
        tracing::warn!(%method, path, %status, elapsed_ms = start.elapsed().as_millis() as u64, "Request failed");
    }

    response
}
