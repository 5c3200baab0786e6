use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub smtp: SmtpConfig,
    pub app_url: String,
    /// Root directory for uploaded CVs and interview audio.
    pub upload_dir: PathBuf,
    /// ffmpeg binary used for answer-audio compression.
    pub ffmpeg_path: String,
    /// Optional JSON file overriding the built-in prompt templates.
    pub prompt_config_path: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            smtp: SmtpConfig {
                host: require_env("SMTP_HOST")?,
                port: std::env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse::<u16>()
                    .context("SMTP_PORT must be a valid port number")?,
                username: require_env("SMTP_USER")?,
                password: require_env("SMTP_PASSWORD")?,
                from_email: std::env::var("SMTP_FROM_EMAIL")
                    .unwrap_or_else(|_| "noreply@viva.example".to_string()),
                from_name: std::env::var("SMTP_FROM_NAME")
                    .unwrap_or_else(|_| "Viva Hiring".to_string()),
            },
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            upload_dir: PathBuf::from(
                std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            ),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            prompt_config_path: std::env::var("PROMPT_CONFIG_PATH").ok().map(PathBuf::from),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
