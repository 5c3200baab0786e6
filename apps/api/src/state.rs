use sqlx::PgPool;

use crate::ai_client::AiService;
use crate::config::Config;
use crate::interview::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub ai: AiService,
    /// Interview session orchestrator driving the WebSocket channel.
    pub interview: Orchestrator,
}
