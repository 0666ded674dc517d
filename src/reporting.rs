//! Read-only aggregates behind the admin and team dashboards.

use crate::{domain::LeadStatus, leads::EventType};
use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

const LATEST_LEADS: i64 = 8;
const EMAIL_ACTIVITY_LIMIT: i64 = 100;
const TEAM_RECENT_LEADS: i64 = 6;
const TEAM_RECENT_EMAILS: i64 = 5;

fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - TimeDelta::days(7)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberEmailRow {
    actor_id: Option<Uuid>,
    count: i64,
    full_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberEmailCount {
    pub actor_id: Option<Uuid>,
    pub count: i64,
    pub name: String,
    pub email: String,
}

impl From<MemberEmailRow> for MemberEmailCount {
    fn from(row: MemberEmailRow) -> Self {
        let name = row
            .full_name
            .clone()
            .or_else(|| row.email.clone())
            .unwrap_or_else(|| "Unknown".into());
        Self {
            actor_id: row.actor_id,
            count: row.count,
            name,
            email: row.email.unwrap_or_else(|| "N/A".into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_leads: i64,
    pub leads_this_week: i64,
    pub emails_this_week: i64,
    pub emails_per_member: Vec<MemberEmailCount>,
    pub latest_leads: Vec<LeadSummary>,
}

/// One outbound email, joined with the lead it went to and who sent it.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailActivity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub lead_name: Option<String>,
    pub lead_email: Option<String>,
    pub actor_name: Option<String>,
    pub actor_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDashboard {
    pub total_leads: i64,
    pub active_leads: i64,
    pub my_emails_this_week: i64,
    pub team_emails_this_week: i64,
    pub recent_leads: Vec<LeadSummary>,
    pub recent_emails: Vec<EmailActivity>,
}

const ACTIVITY_SELECT: &str = r#"
    SELECT e.id, e.created_at,
        e.payload ->> 'subject' AS subject,
        e.payload ->> 'textBody' AS text_body,
        l.name AS lead_name, l.email AS lead_email,
        u.full_name AS actor_name, u.email AS actor_email
    FROM lead_events e
    LEFT JOIN leads l ON l.id = e.lead_id
    LEFT JOIN users u ON u.id = e.actor_id
    WHERE e.event_type = $1
"#;

#[tracing::instrument(name = "Load admin dashboard", skip(pool))]
pub async fn admin_dashboard(now: DateTime<Utc>, pool: &PgPool) -> anyhow::Result<AdminDashboard> {
    let since = week_start(now);

    let total_leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await
        .context("Failed to count leads.")?;
    let leads_this_week: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE created_at >= $1")
            .bind(since)
            .fetch_one(pool)
            .await
            .context("Failed to count this week's leads.")?;

    let emails_per_member: Vec<MemberEmailCount> = sqlx::query_as::<_, MemberEmailRow>(
        r#"
        SELECT e.actor_id, COUNT(*) AS count, u.full_name, u.email
        FROM lead_events e
        LEFT JOIN users u ON u.id = e.actor_id
        WHERE e.event_type = $1 AND e.created_at >= $2
        GROUP BY e.actor_id, u.full_name, u.email
        ORDER BY count DESC
        "#,
    )
    .bind(EventType::EmailSent.as_str())
    .bind(since)
    .fetch_all(pool)
    .await
    .context("Failed to count emails per member.")?
    .into_iter()
    .map(MemberEmailCount::from)
    .collect();
    let emails_this_week = emails_per_member.iter().map(|m| m.count).sum();

    let latest_leads = sqlx::query_as::<_, LeadSummary>(
        r#"
        SELECT id, name, email, status, created_at, updated_at
        FROM leads
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(LATEST_LEADS)
    .fetch_all(pool)
    .await
    .context("Failed to load the latest leads.")?;

    Ok(AdminDashboard {
        total_leads,
        leads_this_week,
        emails_this_week,
        emails_per_member,
        latest_leads,
    })
}

#[tracing::instrument(name = "Load email activity", skip(pool))]
pub async fn email_activity(pool: &PgPool) -> anyhow::Result<Vec<EmailActivity>> {
    sqlx::query_as::<_, EmailActivity>(&format!(
        "{ACTIVITY_SELECT} ORDER BY e.created_at DESC LIMIT $2"
    ))
    .bind(EventType::EmailSent.as_str())
    .bind(EMAIL_ACTIVITY_LIMIT)
    .fetch_all(pool)
    .await
    .context("Failed to load email activity.")
}

#[tracing::instrument(name = "Load team dashboard", skip(pool))]
pub async fn team_dashboard(
    user_id: Uuid,
    now: DateTime<Utc>,
    pool: &PgPool,
) -> anyhow::Result<TeamDashboard> {
    let since = week_start(now);

    let total_leads: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE assigned_to = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to count assigned leads.")?;
    let closed: Vec<&str> = LeadStatus::ALL
        .iter()
        .filter(|status| !status.is_open())
        .map(LeadStatus::as_str)
        .collect();
    let active_leads: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM leads WHERE assigned_to = $1 AND status <> ALL($2)",
    )
    .bind(user_id)
    .bind(&closed)
    .fetch_one(pool)
    .await
    .context("Failed to count active leads.")?;
    let my_emails_this_week: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lead_events \
        WHERE event_type = $1 AND actor_id = $2 AND created_at >= $3",
    )
    .bind(EventType::EmailSent.as_str())
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count the member's emails.")?;
    let team_emails_this_week: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lead_events WHERE event_type = $1 AND created_at >= $2",
    )
    .bind(EventType::EmailSent.as_str())
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count the team's emails.")?;

    let recent_leads = sqlx::query_as::<_, LeadSummary>(
        r#"
        SELECT id, name, email, status, created_at, updated_at
        FROM leads
        WHERE assigned_to = $1
        ORDER BY updated_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(TEAM_RECENT_LEADS)
    .fetch_all(pool)
    .await
    .context("Failed to load recent leads.")?;

    let recent_emails = sqlx::query_as::<_, EmailActivity>(&format!(
        "{ACTIVITY_SELECT} AND e.actor_id = $2 ORDER BY e.created_at DESC LIMIT $3"
    ))
    .bind(EventType::EmailSent.as_str())
    .bind(user_id)
    .bind(TEAM_RECENT_EMAILS)
    .fetch_all(pool)
    .await
    .context("Failed to load recent emails.")?;

    Ok(TeamDashboard {
        total_leads,
        active_leads,
        my_emails_this_week,
        team_emails_this_week,
        recent_leads,
        recent_emails,
    })
}
