#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One candidate's application to one job.
///
/// `status` moves pending -> in_progress -> completed; staff may later apply
/// the terminal administrative states shortlisted/rejected out-of-band.
/// `total_weightage` is fixed at application creation as the sum of the job's
/// question weightages at that time. `total_score` accumulates per answer and
/// is frozen once `completed_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub total_score: f64,
    pub total_weightage: i32,
    pub personality_profile: Option<String>,
    pub interview_transcript: Option<String>,
    pub ip_address: Option<String>,
    pub local_time: Option<String>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One answer per question per application, created exactly once,
/// including for skipped questions.
///
/// `weightage` is copied from the question at answer time so later edits to
/// the question cannot change the historical scoring basis.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub question_id: Uuid,
    pub answer_text: Option<String>,
    pub audio_path: Option<String>,
    pub score: f64,
    pub weightage: i32,
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}
