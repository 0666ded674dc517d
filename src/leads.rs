//! Lead records and their audit trail.

use crate::domain::{LeadStatus, NewLead};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub source: Option<serde_json::Value>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const LEAD_COLUMNS: &str = "id, name, email, company, phone, notes, message, status, source, \
    assigned_to, created_at, updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeadEvent {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub workspace_email_id: Option<Uuid>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Created,
    Assigned,
    StatusChanged,
    EmailSent,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::StatusChanged => "status_changed",
            Self::EmailSent => "email_sent",
        }
    }
}

pub struct NewLeadEvent {
    pub lead_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub workspace_email_id: Option<Uuid>,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(thiserror::Error, Debug)]
pub enum UpsertLeadError {
    #[error("The assignee does not exist.")]
    UnknownAssignee,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

#[tracing::instrument(name = "Get lead", skip(executor))]
pub async fn get_lead(id: Uuid, executor: impl PgExecutor<'_>) -> anyhow::Result<Option<Lead>> {
    sqlx::query_as::<_, Lead>(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch the lead.")
}

#[tracing::instrument(name = "List leads", skip(executor))]
pub async fn list_leads(executor: impl PgExecutor<'_>) -> anyhow::Result<Vec<Lead>> {
    sqlx::query_as::<_, Lead>(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC"
    ))
    .fetch_all(executor)
    .await
    .context("Failed to list leads.")
}

#[tracing::instrument(name = "List assigned leads", skip(executor))]
pub async fn list_assigned_leads(
    user_id: Uuid,
    limit: Option<i64>,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<Vec<Lead>> {
    sqlx::query_as::<_, Lead>(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads WHERE assigned_to = $1 \
        ORDER BY updated_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
    .context("Failed to list assigned leads.")
}

#[derive(sqlx::FromRow)]
struct UpsertedLead {
    #[sqlx(flatten)]
    lead: Lead,
    created: bool,
}

/// Leads are matched on email; every supplied field overwrites the stored one,
/// except `status`, which is only changed when given.
#[tracing::instrument(name = "Upsert lead", skip(lead, pool), fields(lead_email = ?lead.email))]
pub async fn upsert_lead(
    lead: &NewLead,
    pool: &PgPool,
) -> Result<(Lead, UpsertOutcome), UpsertLeadError> {
    let mut txn = pool.begin().await.context("Failed to begin a transaction.")?;

    // A lead without email never conflicts, so it is always inserted.
    let stored = sqlx::query_as::<_, UpsertedLead>(&format!(
        r#"
        INSERT INTO leads (id, name, email, company, phone, notes, message, status, source, assigned_to)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 'new'), $9, $10)
        ON CONFLICT (email) DO UPDATE SET
            name = EXCLUDED.name,
            company = EXCLUDED.company,
            phone = EXCLUDED.phone,
            notes = EXCLUDED.notes,
            message = EXCLUDED.message,
            status = COALESCE($8, leads.status),
            source = EXCLUDED.source,
            assigned_to = EXCLUDED.assigned_to,
            updated_at = now()
        RETURNING {LEAD_COLUMNS}, (xmax = 0) AS created
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(lead.name.as_ref())
    .bind(lead.email.as_ref().map(AsRef::<str>::as_ref))
    .bind(lead.company.as_deref())
    .bind(lead.phone.as_deref())
    .bind(lead.notes.as_deref())
    .bind(lead.message.as_deref())
    .bind(lead.status.map(|s| s.as_str()))
    .bind(lead.source.as_ref())
    .bind(lead.assigned_to)
    .fetch_one(txn.as_mut())
    .await;

    let UpsertedLead { lead: stored, created } = match stored {
        Ok(stored) => stored,
        Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
            return Err(UpsertLeadError::UnknownAssignee)
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Failed to store the lead.").into()),
    };

    let outcome = if created {
        UpsertOutcome::Created
    } else {
        UpsertOutcome::Updated
    };
    if outcome == UpsertOutcome::Created {
        record_event(
            &NewLeadEvent {
                lead_id: stored.id,
                actor_id: None,
                workspace_email_id: None,
                event_type: EventType::Created,
                payload: serde_json::json!({
                    "origin": "api.leads",
                    "source": lead.source,
                    "ingestedAt": Utc::now(),
                }),
            },
            txn.as_mut(),
        )
        .await?;
    }

    txn.commit().await.context("Failed to commit the lead.")?;
    Ok((stored, outcome))
}

/// `None` when the lead does not exist.
#[tracing::instrument(name = "Assign lead", skip(executor))]
pub async fn assign_lead(
    lead_id: Uuid,
    assignee: Option<Uuid>,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<Option<Lead>> {
    sqlx::query_as::<_, Lead>(&format!(
        "UPDATE leads SET assigned_to = $2, updated_at = now() WHERE id = $1 \
        RETURNING {LEAD_COLUMNS}"
    ))
    .bind(lead_id)
    .bind(assignee)
    .fetch_optional(executor)
    .await
    .context("Failed to assign the lead.")
}

#[tracing::instrument(name = "Set lead status", skip(executor))]
pub async fn set_status(
    lead_id: Uuid,
    status: LeadStatus,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE leads SET status = $2, updated_at = now() WHERE id = $1")
        .bind(lead_id)
        .bind(status.as_str())
        .execute(executor)
        .await
        .context("Failed to update the lead status.")?;
    Ok(())
}

#[tracing::instrument(name = "Record lead event", skip_all, fields(lead_id = %event.lead_id, event_type = event.event_type.as_str()))]
pub async fn record_event(event: &NewLeadEvent, executor: impl PgExecutor<'_>) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lead_events (id, lead_id, actor_id, workspace_email_id, event_type, payload)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.lead_id)
    .bind(event.actor_id)
    .bind(event.workspace_email_id)
    .bind(event.event_type.as_str())
    .bind(&event.payload)
    .execute(executor)
    .await
    .context("Failed to record the lead event.")?;
    Ok(())
}

#[tracing::instrument(name = "List lead events", skip(executor))]
pub async fn list_events(lead_id: Uuid, executor: impl PgExecutor<'_>) -> anyhow::Result<Vec<LeadEvent>> {
    sqlx::query_as::<_, LeadEvent>(
        r#"
        SELECT id, lead_id, actor_id, workspace_email_id, event_type, payload, created_at
        FROM lead_events
        WHERE lead_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(lead_id)
    .fetch_all(executor)
    .await
    .context("Failed to list lead events.")
}
