pub mod applications;
pub mod health;
pub mod jobs;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::interview::socket::ws_handler;
use crate::state::AppState;

/// CV uploads dominate request size; audio travels over the WebSocket.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/jobs/:job_id/questions/generate",
            post(jobs::handle_generate_questions),
        )
        .route("/api/v1/jobs/:job_id/apply", post(applications::handle_apply))
        .route("/ws/interview", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
