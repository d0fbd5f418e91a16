pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::path::Path;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers::{docs, generate, health, history, metrics, payment, quota, AppState};

/// Room for multipart boundaries and the small text fields next to the image.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let api = Router::new()
        .route(
            "/generate",
            post(generate::generate_portrait).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/quota", get(quota::get_quota))
        .route("/history", get(history::list_history))
        .route("/history/:id", delete(history::delete_history))
        .route("/products", get(payment::list_products))
        .route("/checkout", post(payment::create_checkout))
        .route("/webhooks/creem", post(payment::creem_webhook));

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api", api)
        .merge(docs::create_docs_router());

    // Ledger documents live beside the images, so only the image prefixes are exposed.
    if state.config.storage.storage_type == "local" {
        let root = Path::new(&state.config.storage.local_path);
        app = app
            .nest_service("/files/generated", ServeDir::new(root.join("generated")))
            .nest_service("/files/uploads", ServeDir::new(root.join("uploads")));
    }

    app.layer(from_fn_with_state(state.clone(), middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
