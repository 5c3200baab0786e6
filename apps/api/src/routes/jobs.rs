use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{JobRow, QuestionRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GenerateQuestionsRequest {
    /// Optional override; defaults to the job's stored description.
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/v1/jobs/:job_id/questions/generate
///
/// Generates pre-screening questions for a job and appends them after the
/// existing ones. Provider failure degrades to the generic question set, so
/// this endpoint never fails on AI availability.
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<GenerateQuestionsRequest>,
) -> Result<Json<Vec<QuestionRow>>, AppError> {
    let job: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?;
    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    let description = req
        .description
        .or(job.description_html)
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            AppError::Validation("Job has no description to generate questions from".to_string())
        })?;

    let generated = state.ai.generate_questions(&description).await;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE job_id = $1")
        .bind(job_id)
        .fetch_one(&state.db)
        .await?;

    let mut rows = Vec::with_capacity(generated.len());
    for (i, question) in generated.into_iter().enumerate() {
        let row: QuestionRow = sqlx::query_as(
            r#"
            INSERT INTO questions (id, job_id, text, weightage, is_ai_generated, order_index)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(&question.text)
        .bind(question.weightage)
        .bind(existing as i32 + i as i32)
        .fetch_one(&state.db)
        .await?;
        rows.push(row);
    }

    Ok(Json(rows))
}
