pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/v1/ngrams", post(handlers::handle_ngrams))
        .route("/api/v1/rewrite", post(handlers::handle_rewrite))
        .route("/api/v1/score", post(handlers::handle_score))
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .with_state(state)
}
