use crate::{
    auth::{get_user, UserId},
    domain::{Assignment, FieldIssues},
    leads::{self, EventType, NewLeadEvent},
    routes::ApiError,
};
use actix_web::{get, post, web, HttpResponse};
use anyhow::Context;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

#[get("/leads")]
#[tracing::instrument(name = "List all leads", skip(pool))]
pub async fn admin_leads(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let leads = leads::list_leads(pool.as_ref()).await?;
    Ok(HttpResponse::Ok().json(leads))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeadBody {
    assigned_to: Assignment,
}

#[post("/leads/{lead_id}/assign")]
#[tracing::instrument(name = "Assign a lead", skip(body, pool), fields(user_id = %*user_id))]
pub async fn assign_lead(
    path: web::Path<Uuid>,
    body: web::Json<AssignLeadBody>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let lead_id = path.into_inner();
    let assignee = body.assigned_to.target();

    if let Some(assignee) = assignee {
        if get_user(assignee, pool.as_ref()).await?.is_none() {
            let mut issues = FieldIssues::new();
            issues.push("assignedTo", "Unknown team member.");
            return Err(ApiError::with_issues("Invalid assignment.", issues));
        }
    }

    let mut txn = pool.begin().await.context("Failed to begin a transaction.")?;
    let previous = leads::get_lead(lead_id, txn.as_mut())
        .await?
        .ok_or_else(|| ApiError::not_found("Lead not found."))?;
    let lead = leads::assign_lead(lead_id, assignee, txn.as_mut())
        .await?
        .ok_or_else(|| ApiError::not_found("Lead not found."))?;
    leads::record_event(
        &NewLeadEvent {
            lead_id,
            actor_id: Some(**user_id),
            workspace_email_id: None,
            event_type: EventType::Assigned,
            payload: serde_json::json!({
                "from": previous.assigned_to,
                "to": assignee,
            }),
        },
        txn.as_mut(),
    )
    .await?;
    txn.commit().await.context("Failed to commit the assignment.")?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "lead": lead })))
}
