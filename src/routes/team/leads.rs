use crate::{
    auth::{get_user, User, UserId},
    domain::{FieldIssues, LeadStatus},
    email_templates,
    leads::{self, EventType, Lead, NewLeadEvent},
    routes::ApiError,
};
use actix_web::{get, post, web, HttpResponse};
use anyhow::Context;
use serde::Deserialize;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

#[get("/leads")]
#[tracing::instrument(name = "List my leads", skip(pool), fields(user_id = %*user_id))]
pub async fn team_leads(
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let leads = leads::list_assigned_leads(**user_id, None, pool.as_ref()).await?;
    Ok(HttpResponse::Ok().json(leads))
}

async fn current_user(user_id: UserId, pool: &PgPool) -> Result<User, ApiError> {
    get_user(*user_id, pool)
        .await?
        .context("The signed-in user no longer exists.")
        .map_err(ApiError::from)
}

/// Team members only see the leads assigned to them; anything else is
/// reported as missing.
fn visible_to(lead: Option<Lead>, user: &User) -> Result<Lead, ApiError> {
    match lead {
        Some(lead) if user.is_admin() || lead.assigned_to == Some(user.id) => Ok(lead),
        _ => Err(ApiError::not_found("Lead not found.")),
    }
}

#[get("/leads/{lead_id}")]
#[tracing::instrument(name = "Show a lead", skip(pool), fields(user_id = %*user_id))]
pub async fn team_lead_detail(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(user_id.into_inner(), &pool).await?;
    let lead = visible_to(leads::get_lead(path.into_inner(), pool.as_ref()).await?, &user)?;
    let events = leads::list_events(lead.id, pool.as_ref()).await?;
    let templates = email_templates::list_templates(pool.as_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "lead": lead,
        "events": events,
        "workspaceEmailId": user.workspace_email_id,
        "templates": templates,
    })))
}

#[derive(Deserialize, Debug)]
pub struct StatusBody {
    #[serde(default)]
    status: String,
}

#[post("/leads/{lead_id}/status")]
#[tracing::instrument(name = "Change a lead status", skip(body, pool), fields(user_id = %*user_id))]
pub async fn update_lead_status(
    path: web::Path<Uuid>,
    body: web::Json<StatusBody>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let status = LeadStatus::from_str(body.status.trim()).map_err(|e| {
        let mut issues = FieldIssues::new();
        issues.push("status", e);
        ApiError::with_issues("Invalid status.", issues)
    })?;
    let user = current_user(user_id.into_inner(), &pool).await?;

    let mut txn = pool.begin().await.context("Failed to begin a transaction.")?;
    let lead = visible_to(leads::get_lead(path.into_inner(), txn.as_mut()).await?, &user)?;
    leads::set_status(lead.id, status, txn.as_mut()).await?;
    leads::record_event(
        &NewLeadEvent {
            lead_id: lead.id,
            actor_id: Some(user.id),
            workspace_email_id: None,
            event_type: EventType::StatusChanged,
            payload: serde_json::json!({
                "from": lead.status,
                "to": status,
            }),
        },
        txn.as_mut(),
    )
    .await?;
    txn.commit().await.context("Failed to commit the status change.")?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true, "status": status })))
}
