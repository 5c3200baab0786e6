use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::JobRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ApplyResponse {
    pub application_id: Uuid,
    pub interview_url: String,
}

/// POST /api/v1/jobs/:job_id/apply
///
/// Public application form: candidate details plus a CV upload. The CV is
/// analyzed against the job description at apply time; analysis failure
/// degrades to a pending summary and never blocks the application.
pub async fn handle_apply(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ApplyResponse>, AppError> {
    let job: Option<JobRow> =
        sqlx::query_as("SELECT * FROM jobs WHERE id = $1 AND status = 'published'")
            .bind(job_id)
            .fetch_optional(&state.db)
            .await?;
    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    let mut form = ApplyForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("first_name") => form.first_name = read_text(field).await?,
            Some("last_name") => form.last_name = read_text(field).await?,
            Some("email") => form.email = read_text(field).await?,
            Some("phone") => form.phone = non_empty(read_text(field).await?),
            Some("local_time") => form.local_time = non_empty(read_text(field).await?),
            Some("timezone") => form.timezone = non_empty(read_text(field).await?),
            Some("cv") => {
                let filename = field.file_name().unwrap_or("cv.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read CV upload: {e}")))?;
                form.cv = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    for (value, name) in [
        (&form.first_name, "first_name"),
        (&form.last_name, "last_name"),
        (&form.email, "email"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{name} is required")));
        }
    }
    let (cv_filename, cv_bytes) = form
        .cv
        .ok_or_else(|| AppError::Validation("CV upload is required".to_string()))?;

    // Persist the CV under a non-guessable name, keeping the extension.
    let extension = FsPath::new(&cv_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pdf")
        .to_lowercase();
    let cv_path = format!("cv/cv_{}.{extension}", Uuid::new_v4());
    let full_path = state.config.upload_dir.join(&cv_path);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create upload dir: {e}")))?;
    }
    tokio::fs::write(&full_path, &cv_bytes)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to store CV: {e}")))?;

    let cv_text = extract_cv_text(&full_path, &extension).await;
    let description = job.description_html.as_deref().unwrap_or("");
    let analysis = state.ai.analyze_cv(&cv_text, description).await;

    let candidate_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO candidates
            (id, first_name, last_name, email, phone, cv_path, cv_summary, matching_percentage)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(candidate_id)
    .bind(form.first_name.trim())
    .bind(form.last_name.trim())
    .bind(form.email.trim())
    .bind(&form.phone)
    .bind(&cv_path)
    .bind(&analysis.summary)
    .bind(analysis.matching_percentage)
    .execute(&state.db)
    .await?;

    // total_weightage is fixed here: later question edits must not change the
    // scoring basis of an application already in flight.
    let total_weightage: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(weightage), 0) FROM questions WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&state.db)
            .await?;

    let application_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO applications
            (id, candidate_id, job_id, status, total_weightage, ip_address, local_time, timezone)
        VALUES ($1, $2, $3, 'in_progress', $4, $5, $6, $7)
        "#,
    )
    .bind(application_id)
    .bind(candidate_id)
    .bind(job_id)
    .bind(total_weightage as i32)
    .bind(client_ip(&headers))
    .bind(&form.local_time)
    .bind(&form.timezone)
    .execute(&state.db)
    .await?;

    Ok(Json(ApplyResponse {
        application_id,
        interview_url: format!("{}/interview/{}", state.config.app_url, application_id),
    }))
}

#[derive(Default)]
struct ApplyForm {
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    local_time: Option<String>,
    timezone: Option<String>,
    cv: Option<(String, Vec<u8>)>,
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form field: {e}")))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Extracts text from a stored PDF CV; other formats (and extraction
/// failures) yield an empty string and the analysis reports it as pending.
async fn extract_cv_text(path: &FsPath, extension: &str) -> String {
    if extension != "pdf" {
        return String::new();
    }
    let path = path.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path)).await;
    match extracted {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("CV text extraction failed: {e}");
            String::new()
        }
        Err(e) => {
            warn!("CV extraction task failed: {e}");
            String::new()
        }
    }
}

/// First hop of X-Forwarded-For, when the reverse proxy provides it.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
