use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;

/// Uploaded PDFs routinely exceed axum's 2 MB default body limit.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(api::status))
        .route("/api/conversations", get(api::list_conversations))
        .route("/api/history/{conversation_id}", get(api::conversation_history))
        .route("/api/new_chat", post(api::new_chat))
        .route("/api/upload", post(api::upload))
        .route("/api/query", post(api::query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
