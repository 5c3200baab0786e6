use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A job opening owned by an organization.
/// `status` is one of: draft, published, ended.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description_html: Option<String>,
    pub status: String,
    pub public_url_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A pre-screening question authored for a job.
///
/// `order_index` is the authoring order shown to staff; the interview itself
/// presents questions in a per-session randomized order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub text: String,
    pub weightage: i32,
    pub is_ai_generated: bool,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}
