use super::password::compute_password_hash;
use crate::{
    config::BootstrapAdminSettings,
    domain::{EmailAddress, FullName, Role, ValidPassword},
    telemetry,
    utils::error_chain_fmt,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use std::fmt::Debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub workspace_email_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Name shown in reports, falling back to the address.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

pub struct NewUser {
    pub email: EmailAddress,
    pub full_name: Option<FullName>,
    pub role: Role,
    pub password: ValidPassword,
}

#[derive(thiserror::Error)]
pub enum CreateUserError {
    #[error("A user with this email already exists.")]
    EmailTaken,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for CreateUserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[tracing::instrument(name = "Get user", skip(executor))]
pub async fn get_user(user_id: Uuid, executor: impl PgExecutor<'_>) -> anyhow::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, full_name, role, workspace_email_id, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .context("Failed to perform a query to retrieve a user.")
}

#[tracing::instrument(name = "List users", skip(executor))]
pub async fn list_users(executor: impl PgExecutor<'_>) -> anyhow::Result<Vec<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, full_name, role, workspace_email_id, created_at
        FROM users
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(executor)
    .await
    .context("Failed to list users.")
}

#[tracing::instrument(name = "Create user", skip(new_user, executor), fields(email = %new_user.email))]
pub async fn create_user(
    new_user: NewUser,
    executor: impl PgExecutor<'_>,
) -> Result<Uuid, CreateUserError> {
    let NewUser {
        email,
        full_name,
        role,
        password,
    } = new_user;
    let password_hash = telemetry::spawn_blocking_with_tracing(|| compute_password_hash(password))
        .await
        .context("Failed to spawn blocking task.")?
        .context("Failed to hash password")?;

    let id = Uuid::new_v4();
    let outcome = sqlx::query(
        r#"
        INSERT INTO users (id, email, full_name, role, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(email.as_ref().to_lowercase())
    .bind(full_name.as_ref().map(AsRef::<str>::as_ref))
    .bind(role.as_str())
    .bind(password_hash.expose_secret())
    .execute(executor)
    .await;

    match outcome {
        Ok(_) => Ok(id),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(CreateUserError::EmailTaken)
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context("Failed to insert a new user.")
            .into()),
    }
}

#[derive(thiserror::Error)]
pub enum AssignWorkspaceError {
    #[error("Workspace email not found.")]
    UnknownWorkspace,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for AssignWorkspaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// `Ok(false)` when the user does not exist. `None` unassigns.
#[tracing::instrument(name = "Assign workspace email", skip(executor))]
pub async fn assign_workspace_email(
    user_id: Uuid,
    workspace_email_id: Option<Uuid>,
    executor: impl PgExecutor<'_>,
) -> Result<bool, AssignWorkspaceError> {
    let outcome = sqlx::query("UPDATE users SET workspace_email_id = $2 WHERE id = $1")
        .bind(user_id)
        .bind(workspace_email_id)
        .execute(executor)
        .await;

    match outcome {
        Ok(done) => Ok(done.rows_affected() > 0),
        Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
            Err(AssignWorkspaceError::UnknownWorkspace)
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context("Failed to assign the workspace email.")
            .into()),
    }
}

/// Removes a member and hands their leads back to the unassigned pool.
/// `false` when the user does not exist.
#[tracing::instrument(name = "Delete user", skip(pool))]
pub async fn delete_user(user_id: Uuid, pool: &PgPool) -> anyhow::Result<bool> {
    let mut txn = pool.begin().await.context("Failed to begin a transaction.")?;
    sqlx::query("UPDATE leads SET assigned_to = NULL, updated_at = now() WHERE assigned_to = $1")
        .bind(user_id)
        .execute(txn.as_mut())
        .await
        .context("Failed to unassign the member's leads.")?;
    let rows = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(txn.as_mut())
        .await
        .context("Failed to delete the user.")?
        .rows_affected();
    txn.commit().await.context("Failed to commit the user removal.")?;
    Ok(rows > 0)
}

/// Seeds the first admin account so a fresh deployment can sign in.
#[tracing::instrument(name = "Ensure bootstrap admin", skip_all)]
pub async fn ensure_bootstrap_admin(
    settings: &BootstrapAdminSettings,
    pool: &PgPool,
) -> anyhow::Result<()> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await
        .context("Failed to count admin users.")?;
    if admins > 0 {
        return Ok(());
    }

    let new_user = NewUser {
        email: EmailAddress::parse_lowercase(&settings.email).map_err(anyhow::Error::msg)?,
        full_name: Some(FullName::parse(&settings.full_name).map_err(anyhow::Error::msg)?),
        role: Role::Admin,
        password: ValidPassword::parse(settings.password.clone())?,
    };
    match create_user(new_user, pool).await {
        Ok(id) => {
            tracing::info!(user_id = %id, "Created bootstrap admin");
            Ok(())
        }
        Err(CreateUserError::EmailTaken) => {
            tracing::warn!("Bootstrap admin email belongs to an existing non-admin user");
            Ok(())
        }
        Err(CreateUserError::UnexpectedError(e)) => Err(e),
    }
}
