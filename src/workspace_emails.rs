//! Linked Google Workspace mailboxes and their OAuth credentials.

use crate::{
    google::{needs_refresh, OAuthClient, OAuthError, TokenSet},
    utils::error_chain_fmt,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use std::fmt::Debug;
use uuid::Uuid;

/// Full row, token material included. Never serialized.
#[derive(sqlx::FromRow)]
pub struct WorkspaceEmail {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// What admins get to see about a mailbox.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEmailSummary {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub google_account_id: Option<String>,
    pub is_active: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Details captured when the admin started the consent flow.
pub struct LinkedMailbox<'a> {
    pub email: &'a str,
    pub display_name: &'a str,
    pub google_account_id: &'a str,
    pub created_by: Uuid,
}

#[derive(thiserror::Error)]
pub enum TokenError {
    #[error("Workspace email does not have a refresh token.")]
    MissingRefreshToken,
    #[error("Failed to refresh the workspace email access token.")]
    RefreshFailed(#[from] OAuthError),
}

impl Debug for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[tracing::instrument(name = "Get workspace email", skip(executor))]
pub async fn get_workspace_email(
    id: Uuid,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<Option<WorkspaceEmail>> {
    sqlx::query_as::<_, WorkspaceEmail>(
        r#"
        SELECT id, email, display_name, access_token, refresh_token, token_expires_at, is_active
        FROM workspace_emails
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("Failed to fetch the workspace email.")
}

#[tracing::instrument(name = "List workspace emails", skip(executor))]
pub async fn list_workspace_emails(
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<Vec<WorkspaceEmailSummary>> {
    sqlx::query_as::<_, WorkspaceEmailSummary>(
        r#"
        SELECT id, email, display_name, google_account_id, is_active,
            token_expires_at, created_at, updated_at
        FROM workspace_emails
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(executor)
    .await
    .context("Failed to list workspace emails.")
}

/// Inserts the mailbox, or replaces the tokens of an already linked one.
#[tracing::instrument(name = "Upsert linked mailbox", skip(mailbox, tokens, executor), fields(email = %mailbox.email))]
pub async fn upsert_linked_mailbox(
    mailbox: &LinkedMailbox<'_>,
    tokens: &TokenSet,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO workspace_emails (
            id, email, google_account_id, display_name, access_token, refresh_token,
            token_expires_at, token_scope, token_type, created_by, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true)
        ON CONFLICT (email) DO UPDATE SET
            google_account_id = EXCLUDED.google_account_id,
            display_name = EXCLUDED.display_name,
            access_token = EXCLUDED.access_token,
            refresh_token = EXCLUDED.refresh_token,
            token_expires_at = EXCLUDED.token_expires_at,
            token_scope = EXCLUDED.token_scope,
            token_type = EXCLUDED.token_type,
            created_by = EXCLUDED.created_by,
            is_active = true,
            updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(mailbox.email)
    .bind(mailbox.google_account_id)
    .bind(mailbox.display_name)
    .bind(tokens.access_token.expose_secret())
    .bind(tokens.refresh_token.expose_secret())
    .bind(tokens.expires_at)
    .bind(tokens.scope.as_deref())
    .bind(tokens.token_type.as_deref())
    .bind(mailbox.created_by)
    .fetch_one(executor)
    .await
    .context("Failed to store the linked workspace email.")
}

#[tracing::instrument(name = "Store refreshed tokens", skip(tokens, executor))]
async fn store_tokens(id: Uuid, tokens: &TokenSet, executor: impl PgExecutor<'_>) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE workspace_emails
        SET access_token = $2,
            refresh_token = $3,
            token_expires_at = $4,
            token_scope = $5,
            token_type = $6,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(tokens.access_token.expose_secret())
    .bind(tokens.refresh_token.expose_secret())
    .bind(tokens.expires_at)
    .bind(tokens.scope.as_deref())
    .bind(tokens.token_type.as_deref())
    .execute(executor)
    .await
    .context("Failed to persist refreshed tokens.")?;
    Ok(())
}

/// Returns an access token that is valid for at least another minute,
/// refreshing and persisting it first when needed.
#[tracing::instrument(name = "Get fresh access token", skip_all, fields(workspace_email_id = %workspace.id))]
pub async fn fresh_access_token(
    workspace: &mut WorkspaceEmail,
    oauth: &OAuthClient,
    pool: &PgPool,
) -> Result<SecretString, TokenError> {
    let refresh_token = workspace
        .refresh_token
        .clone()
        .map(SecretString::from)
        .ok_or(TokenError::MissingRefreshToken)?;

    if let Some(access_token) = workspace.access_token.as_deref() {
        if !needs_refresh(Some(access_token), workspace.token_expires_at, Utc::now()) {
            return Ok(SecretString::from(access_token));
        }
    }

    let tokens = oauth.refresh(&refresh_token).await?;
    if let Err(e) = store_tokens(workspace.id, &tokens, pool).await {
        tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to persist refreshed tokens");
    }

    workspace.access_token = Some(tokens.access_token.expose_secret().to_string());
    workspace.refresh_token = Some(tokens.refresh_token.expose_secret().to_string());
    workspace.token_expires_at = tokens.expires_at;
    Ok(tokens.access_token)
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Still assigned to at least one user.
    InUse,
    NotFound,
}

/// Refuses to delete a mailbox that is assigned to anyone, in the same statement.
#[tracing::instrument(name = "Delete workspace email", skip(pool))]
pub async fn delete_workspace_email(id: Uuid, pool: &PgPool) -> anyhow::Result<DeleteOutcome> {
    let rows = sqlx::query(
        r#"
        DELETE FROM workspace_emails
        WHERE id = $1
            AND NOT EXISTS (SELECT 1 FROM users WHERE workspace_email_id = $1)
        "#,
    )
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete the workspace email.")?
    .rows_affected();
    if rows > 0 {
        return Ok(DeleteOutcome::Deleted);
    }

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM workspace_emails WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
            .context("Failed to look up the workspace email.")?;
    Ok(if exists {
        DeleteOutcome::InUse
    } else {
        DeleteOutcome::NotFound
    })
}
