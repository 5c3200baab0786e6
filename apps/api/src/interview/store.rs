//! Durable-store operations consumed by the interview orchestrator.
//!
//! The trait keeps the state machine independent of Postgres: production uses
//! `PgInterviewStore`; orchestrator tests use an in-memory fake.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::application::ApplicationRow;
use crate::models::candidate::CandidateRow;
use crate::models::job::QuestionRow;

/// Answer row to persist, score bump included.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub application_id: Uuid,
    pub question_id: Uuid,
    pub answer_text: String,
    pub audio_path: Option<String>,
    pub score: f64,
    pub weightage: i32,
    pub duration: Option<f64>,
}

/// Final totals returned by the one-shot completion update.
#[derive(Debug, Clone, Copy)]
pub struct CompletedTotals {
    pub total_score: f64,
    pub total_weightage: i32,
}

#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn application(&self, id: Uuid) -> Result<Option<ApplicationRow>>;

    async fn candidate(&self, id: Uuid) -> Result<Option<CandidateRow>>;

    /// All questions for a job, in authoring order.
    async fn questions_for_job(&self, job_id: Uuid) -> Result<Vec<QuestionRow>>;

    async fn question(&self, id: Uuid) -> Result<Option<QuestionRow>>;

    /// Inserts the answer row and additively bumps the application's total
    /// score in a single transaction: both commit or neither does. Fails if
    /// the application has already been completed.
    async fn record_answer(&self, answer: NewAnswer) -> Result<()>;

    /// Marks the application completed and stores the profile and transcript.
    /// Returns `None` if the application was already completed, making
    /// finalization idempotent under a double trigger.
    async fn finalize(
        &self,
        application_id: Uuid,
        personality_profile: Option<&str>,
        transcript: &str,
    ) -> Result<Option<CompletedTotals>>;
}

pub struct PgInterviewStore {
    pool: PgPool,
}

impl PgInterviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InterviewStore for PgInterviewStore {
    async fn application(&self, id: Uuid) -> Result<Option<ApplicationRow>> {
        Ok(
            sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn candidate(&self, id: Uuid) -> Result<Option<CandidateRow>> {
        Ok(
            sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn questions_for_job(&self, job_id: Uuid) -> Result<Vec<QuestionRow>> {
        Ok(sqlx::query_as::<_, QuestionRow>(
            "SELECT * FROM questions WHERE job_id = $1 ORDER BY order_index",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn question(&self, id: Uuid) -> Result<Option<QuestionRow>> {
        Ok(
            sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn record_answer(&self, answer: NewAnswer) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO answers
                (id, application_id, question_id, answer_text, audio_path, score, weightage, duration)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(answer.application_id)
        .bind(answer.question_id)
        .bind(&answer.answer_text)
        .bind(&answer.audio_path)
        .bind(answer.score)
        .bind(answer.weightage)
        .bind(answer.duration)
        .execute(&mut *tx)
        .await?;

        // The completed_at guard freezes total_score after finalization.
        let updated = sqlx::query(
            "UPDATE applications SET total_score = total_score + $1 \
             WHERE id = $2 AND completed_at IS NULL",
        )
        .bind(answer.score)
        .bind(answer.application_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            bail!(
                "application {} is completed or missing; answer rolled back",
                answer.application_id
            );
        }

        tx.commit().await?;
        Ok(())
    }

    async fn finalize(
        &self,
        application_id: Uuid,
        personality_profile: Option<&str>,
        transcript: &str,
    ) -> Result<Option<CompletedTotals>> {
        let totals = sqlx::query_as::<_, (f64, i32)>(
            r#"
            UPDATE applications
            SET status = 'completed',
                completed_at = NOW(),
                personality_profile = COALESCE($2, personality_profile),
                interview_transcript = $3
            WHERE id = $1 AND status <> 'completed'
            RETURNING total_score, total_weightage
            "#,
        )
        .bind(application_id)
        .bind(personality_profile)
        .bind(transcript)
        .fetch_optional(&self.pool)
        .await?;

        Ok(totals.map(|(total_score, total_weightage)| CompletedTotals {
            total_score,
            total_weightage,
        }))
    }
}
