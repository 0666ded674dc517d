use crate::{
    app::AppBaseUrl,
    auth::{self, AssignWorkspaceError, CreateUserError, NewUser, UserId},
    domain::{Assignment, EmailAddress, FieldIssues, FullName, Role, ValidPassword},
    email_client::EmailClient,
    routes::ApiError,
};
use actix_web::{get, post, web, HttpResponse};
use anyhow::Context;
use secrecy::SecretString;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

#[get("/team")]
#[tracing::instrument(name = "List team members", skip(pool))]
pub async fn team_members(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let members = auth::list_users(pool.as_ref()).await?;
    Ok(HttpResponse::Ok().json(members))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberBody {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    password: SecretString,
}

impl TryFrom<NewMemberBody> for NewUser {
    type Error = FieldIssues;

    fn try_from(body: NewMemberBody) -> Result<Self, Self::Error> {
        let mut issues = FieldIssues::new();
        let full_name = FullName::parse(&body.full_name)
            .map_err(|e| issues.push("fullName", e))
            .ok();
        let email = EmailAddress::parse_lowercase(&body.email)
            .map_err(|e| issues.push("email", e))
            .ok();
        let password = ValidPassword::parse(body.password)
            .map_err(|e| issues.push("password", e.to_string()))
            .ok();

        match (full_name, email, password) {
            (Some(full_name), Some(email), Some(password)) => Ok(NewUser {
                email,
                full_name: Some(full_name),
                role: Role::Team,
                password,
            }),
            _ => Err(issues),
        }
    }
}

#[post("/team")]
#[tracing::instrument(name = "Create a team member", skip(body, pool), fields(user_id = %*user_id))]
pub async fn create_team_member(
    body: web::Json<NewMemberBody>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let new_user = NewUser::try_from(body.into_inner())
        .map_err(|issues| ApiError::with_issues("Invalid team member.", issues))?;

    match auth::create_user(new_user, pool.as_ref()).await {
        Ok(id) => Ok(HttpResponse::Created().json(serde_json::json!({ "id": id }))),
        Err(CreateUserError::EmailTaken) => Err(ApiError::Conflict(
            "This email is already registered. Use a different email or reset the password."
                .into(),
        )),
        Err(CreateUserError::UnexpectedError(e)) => Err(e.into()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteBody {
    #[serde(default)]
    email: String,
    full_name: Option<String>,
}

impl InviteBody {
    /// A blank name is treated as no name.
    fn parse(self) -> Result<(EmailAddress, Option<FullName>), FieldIssues> {
        let mut issues = FieldIssues::new();
        let email = EmailAddress::parse_lowercase(&self.email)
            .map_err(|e| issues.push("email", e))
            .ok();
        let full_name = match self.full_name.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => FullName::parse(name).map(Some),
        }
        .map_err(|e| issues.push("fullName", e));

        match (email, full_name) {
            (Some(email), Ok(full_name)) => Ok((email, full_name)),
            _ => Err(issues),
        }
    }
}

/// Creates the member with a temporary password and emails it to them. The
/// account is only kept if the invite email goes out.
#[post("/team/invite")]
#[tracing::instrument(
    name = "Invite a team member",
    skip(body, pool, email_client, base_url),
    fields(user_id = %*user_id)
)]
pub async fn invite_team_member(
    body: web::Json<InviteBody>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<AppBaseUrl>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let (email, full_name) = body
        .into_inner()
        .parse()
        .map_err(|issues| ApiError::with_issues("Invalid invite.", issues))?;

    let inviter = auth::get_user(**user_id, pool.as_ref())
        .await?
        .context("The signed-in admin no longer exists.")?;
    let inviter = EmailAddress::parse(&inviter.email)
        .map_err(anyhow::Error::msg)
        .context("The signed-in admin has a malformed email address.")?;

    let temporary_password = auth::generate_temporary_password();
    let new_user = NewUser {
        email: email.clone(),
        full_name,
        role: Role::Team,
        password: ValidPassword::parse(temporary_password.clone())
            .context("Generated an unusable temporary password.")?,
    };

    let mut txn = pool.begin().await.context("Failed to begin a transaction.")?;
    let id = match auth::create_user(new_user, txn.as_mut()).await {
        Ok(id) => id,
        Err(CreateUserError::EmailTaken) => {
            return Err(ApiError::Conflict(
                "This email is already registered or has a pending invite.".into(),
            ))
        }
        Err(CreateUserError::UnexpectedError(e)) => return Err(e.into()),
    };

    let login_url = format!("{}/login", base_url.0.trim_end_matches('/'));
    auth::send_invite_email(&email_client, &email, &inviter, &login_url, &temporary_password)
        .await
        .context("Failed to send the invite email.")?;
    txn.commit().await.context("Failed to commit the invited member.")?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "id": id, "email": email })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceAssignmentBody {
    workspace_email_id: Assignment,
}

#[post("/team/{member_id}/workspace-email")]
#[tracing::instrument(name = "Assign a workspace email to a member", skip(body, pool))]
pub async fn assign_member_workspace(
    path: web::Path<Uuid>,
    body: web::Json<WorkspaceAssignmentBody>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let member_id = path.into_inner();
    let workspace_email_id = body.workspace_email_id.target();

    match auth::assign_workspace_email(member_id, workspace_email_id, pool.as_ref()).await {
        Ok(true) => Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true }))),
        Ok(false) => Err(ApiError::not_found("Team member not found.")),
        Err(AssignWorkspaceError::UnknownWorkspace) => {
            let mut issues = FieldIssues::new();
            issues.push("workspaceEmailId", "Workspace email not found.");
            Err(ApiError::with_issues("Invalid assignment.", issues))
        }
        Err(AssignWorkspaceError::UnexpectedError(e)) => Err(e.into()),
    }
}

#[post("/team/{member_id}/delete")]
#[tracing::instrument(name = "Remove a team member", skip(pool), fields(user_id = %*user_id))]
pub async fn remove_team_member(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let member_id = path.into_inner();
    if member_id == **user_id {
        return Err(ApiError::invalid("You cannot remove your own account."));
    }

    if !auth::delete_user(member_id, &pool).await? {
        return Err(ApiError::not_found("Team member not found."));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
