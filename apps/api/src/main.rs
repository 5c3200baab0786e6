mod ai_client;
mod audio;
mod config;
mod db;
mod errors;
mod interview;
mod models;
mod notify;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_client::prompts::PromptRegistry;
use crate::ai_client::{AiService, OpenAiBackend};
use crate::audio::AudioPipeline;
use crate::config::Config;
use crate::db::create_pool;
use crate::interview::orchestrator::Orchestrator;
use crate::interview::session::SessionStore;
use crate::interview::store::PgInterviewStore;
use crate::notify::SmtpNotifier;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Viva API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Upload storage for CVs and interview audio
    tokio::fs::create_dir_all(config.upload_dir.join("interviews")).await?;
    tokio::fs::create_dir_all(config.upload_dir.join("cv")).await?;

    // Prompt registry: optional overrides file over compiled-in defaults
    let prompts = match &config.prompt_config_path {
        Some(path) => PromptRegistry::load(path)?,
        None => PromptRegistry::defaults(),
    };

    // AI service (question generation, CV analysis, scoring, STT/TTS)
    let ai = AiService::new(
        Arc::new(OpenAiBackend::new(config.openai_api_key.clone())),
        prompts,
    );
    info!("AI client initialized");

    // Completion notifications over SMTP
    let notifier = Arc::new(SmtpNotifier::new(db.clone(), &config.smtp)?);

    // Interview orchestrator over the durable store and session store
    let interview = Orchestrator::new(
        Arc::new(PgInterviewStore::new(db.clone())),
        ai.clone(),
        AudioPipeline::new(config.upload_dir.clone(), config.ffmpeg_path.clone()),
        notifier,
        SessionStore::default(),
        None,
    );

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        ai,
        interview,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
