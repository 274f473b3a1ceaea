pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::cv::handlers as cv;
use crate::onboarding::handlers as onboarding;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Users & onboarding
        .route("/api/v1/users", post(onboarding::handle_create_user))
        .route("/api/v1/users/:id", get(onboarding::handle_get_user))
        .route(
            "/api/v1/users/:id/onboarding",
            put(onboarding::handle_onboarding_step),
        )
        // CV processing
        .route(
            "/api/v1/cv/upload",
            post(cv::handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/cv/status", get(cv::handle_status))
        .route("/api/v1/cv", get(cv::handle_get_cv))
        .route("/api/v1/cv/similar", get(cv::handle_similar))
        .with_state(state)
}
