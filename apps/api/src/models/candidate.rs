use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A candidate who applied through the public portal.
/// `cv_summary` and `matching_percentage` are filled by CV analysis at apply time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cv_path: Option<String>,
    pub cv_summary: Option<String>,
    pub matching_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
}
