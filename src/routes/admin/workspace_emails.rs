use crate::{
    auth::UserId,
    domain::{EmailAddress, FieldIssues},
    google::{generate_state_token, OAuthClient},
    routes::ApiError,
    session_state::{PendingWorkspaceLink, Session},
    workspace_emails::{self, DeleteOutcome},
};
use actix_web::{get, post, web, HttpResponse};
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

#[get("/workspace-emails")]
#[tracing::instrument(name = "List workspace emails", skip(pool))]
pub async fn workspace_email_list(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let mailboxes = workspace_emails::list_workspace_emails(pool.as_ref()).await?;
    Ok(HttpResponse::Ok().json(mailboxes))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkMailboxBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
}

/// Starts the Google consent flow; the callback finishes it.
#[post("/workspace-emails")]
#[tracing::instrument(name = "Start linking a workspace email", skip(body, session, oauth), fields(user_id = %*user_id))]
pub async fn start_workspace_link(
    body: web::Json<LinkMailboxBody>,
    session: Session,
    oauth: web::Data<OAuthClient>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let LinkMailboxBody {
        email,
        display_name,
    } = body.into_inner();

    let mut issues = FieldIssues::new();
    let email = EmailAddress::parse(&email)
        .map_err(|_| issues.push("email", "Enter a valid Google Workspace email."))
        .ok();
    let display_name = display_name.trim().to_string();
    if display_name.is_empty() {
        issues.push("displayName", "Display name is required.");
    }
    let Some(email) = email.filter(|_| issues.is_empty()) else {
        return Err(ApiError::with_issues("Invalid workspace email.", issues));
    };

    let state = generate_state_token();
    let auth_url = oauth.authorization_url(&state, Some(email.as_ref()));
    session
        .pending_workspace_link()
        .insert(PendingWorkspaceLink {
            state,
            email: email.as_ref().to_string(),
            display_name,
            user_id: **user_id,
            started_at: Utc::now(),
        })
        .context("Failed to store the pending workspace link.")?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "authUrl": auth_url.as_str() })))
}

#[post("/workspace-emails/{workspace_email_id}/delete")]
#[tracing::instrument(name = "Delete a workspace email", skip(pool))]
pub async fn delete_workspace_email(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    match workspace_emails::delete_workspace_email(path.into_inner(), &pool).await? {
        DeleteOutcome::Deleted => {}
        DeleteOutcome::InUse => {
            return Err(ApiError::Conflict(
                "This mailbox is currently assigned to a team member. Unassign it first.".into(),
            ))
        }
        DeleteOutcome::NotFound => return Err(ApiError::not_found("Workspace email not found.")),
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
