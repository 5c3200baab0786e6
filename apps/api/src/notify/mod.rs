//! Candidate notifications. The orchestrator only sees the `Notifier` trait;
//! delivery failures are logged by the caller and never reach the
//! candidate-facing flow.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::SmtpConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Thanks the candidate after their interview completes.
    async fn interview_completed(&self, application_id: Uuid) -> Result<()>;
}

/// SMTP-backed notifier. Loads the candidate/job/organization context itself
/// so callers only need an application id.
pub struct SmtpNotifier {
    pool: PgPool,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(pool: PgPool, smtp: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .context("Invalid SMTP host")?
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();

        Ok(Self {
            pool,
            transport,
            from: format!("{} <{}>", smtp.from_name, smtp.from_email),
        })
    }
}

#[derive(sqlx::FromRow)]
struct CompletionContext {
    first_name: String,
    last_name: String,
    email: String,
    job_title: String,
    organization_name: String,
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn interview_completed(&self, application_id: Uuid) -> Result<()> {
        let ctx = sqlx::query_as::<_, CompletionContext>(
            r#"
            SELECT c.first_name, c.last_name, c.email,
                   j.title AS job_title, o.name AS organization_name
            FROM applications a
            JOIN candidates c ON c.id = a.candidate_id
            JOIN jobs j ON j.id = a.job_id
            JOIN organizations o ON o.id = j.organization_id
            WHERE a.id = $1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?
        .with_context(|| format!("Application {application_id} has incomplete context"))?;

        let subject = format!(
            "Thank You for Interviewing - {} at {}",
            ctx.job_title, ctx.organization_name
        );
        let html = completion_body(&ctx);

        let message = Message::builder()
            .from(self.from.parse().context("Invalid sender address")?)
            .to(format!("{} {} <{}>", ctx.first_name, ctx.last_name, ctx.email)
                .parse()
                .context("Invalid candidate address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        self.transport.send(message).await?;
        info!("Sent interview completion email for application {application_id}");
        Ok(())
    }
}

fn completion_body(ctx: &CompletionContext) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 24px; background-color: #f9f9f9;">
    <h2 style="text-align: center;">Thank You for Your Time</h2>
    <div style="background-color: #ffffff; padding: 24px; border-radius: 8px;">
      <p>Hi {first} {last},</p>
      <p>Thank you for taking the time to complete the interview for the
         <strong>{job}</strong> role at <strong>{org}</strong>.</p>
      <p>Our hiring team is reviewing your responses carefully. If your profile
         is shortlisted for the next steps, we&rsquo;ll reach out to you with more
         details.</p>
      <p>We appreciate your interest in joining our team and wish you the best
         of luck!</p>
      <p style="margin-top: 24px;">Warm regards,<br>{org} Hiring Team</p>
    </div>
    <p style="text-align: center; font-size: 12px; color: #777;">
      This is an automated message. Please do not reply to this email.
    </p>
  </div>
</body>
</html>"#,
        first = ctx.first_name,
        last = ctx.last_name,
        job = ctx.job_title,
        org = ctx.organization_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_body_mentions_job_and_org() {
        let body = completion_body(&CompletionContext {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            job_title: "Staff Engineer".to_string(),
            organization_name: "Analytical Engines Ltd".to_string(),
        });
        assert!(body.contains("Staff Engineer"));
        assert!(body.contains("Analytical Engines Ltd"));
        assert!(body.contains("Ada Lovelace"));
    }
}
