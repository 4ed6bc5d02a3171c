pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Summary
        .route("/api/v1/summary", post(handlers::handle_summary))
        .route("/api/v1/summary/stream", post(handlers::handle_summary_stream))
        // Sorting
        .route("/api/v1/skills/sort", post(handlers::handle_skill_sort))
        .route(
            "/api/v1/skills/sort/stream",
            post(handlers::handle_skill_sort_stream),
        )
        .route(
            "/api/v1/technologies/sort",
            post(handlers::handle_flat_sort),
        )
        .route(
            "/api/v1/technologies/sort/stream",
            post(handlers::handle_flat_sort_stream),
        )
        // Job description refinement
        .route(
            "/api/v1/job-description/refine",
            post(handlers::handle_refine),
        )
        .route(
            "/api/v1/job-description/refine/stream",
            post(handlers::handle_refine_stream),
        )
        .with_state(state)
}
