//! Reusable outreach templates managed by admins.

use crate::domain::TemplateDraft;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: Uuid,
    pub template_name: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[tracing::instrument(name = "List email templates", skip(executor))]
pub async fn list_templates(executor: impl PgExecutor<'_>) -> anyhow::Result<Vec<EmailTemplate>> {
    sqlx::query_as::<_, EmailTemplate>(
        r#"
        SELECT id, template_name, subject, body_html, body_text, created_by, created_at, updated_at
        FROM email_templates
        ORDER BY updated_at DESC
        "#,
    )
    .fetch_all(executor)
    .await
    .context("Failed to list email templates.")
}

#[tracing::instrument(name = "Create email template", skip(draft, executor), fields(template_name = %draft.template_name))]
pub async fn create_template(
    draft: &TemplateDraft,
    created_by: Uuid,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<EmailTemplate> {
    sqlx::query_as::<_, EmailTemplate>(
        r#"
        INSERT INTO email_templates (id, template_name, subject, body_html, body_text, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, template_name, subject, body_html, body_text, created_by, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&draft.template_name)
    .bind(&draft.subject)
    .bind(&draft.body_html)
    .bind(&draft.body_text)
    .bind(created_by)
    .fetch_one(executor)
    .await
    .context("Failed to store the email template.")
}
