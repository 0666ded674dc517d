use crate::{
    app::AppBaseUrl,
    google::{GmailApi, OAuthClient, OAuthError},
    session_state::{PendingWorkspaceLink, Session},
    utils,
    workspace_emails::{upsert_linked_mailbox, LinkedMailbox},
};
use actix_web::{
    get,
    web::{Data, Query},
    HttpResponse,
};
use anyhow::Context;
use chrono::Utc;
use reqwest::Url;
use sqlx::PgPool;

#[derive(serde::Deserialize, Debug)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Google redirects the admin here after the consent screen. Every outcome
/// lands back on the mailbox list with either `status=linked` or `error=...`.
#[get("/google/oauth/callback")]
#[tracing::instrument(name = "Finish linking a workspace mailbox", skip_all)]
pub async fn google_oauth_callback(
    query: Query<CallbackParams>,
    session: Session,
    pool: Data<PgPool>,
    oauth: Data<OAuthClient>,
    gmail: Data<GmailApi>,
    base_url: Data<AppBaseUrl>,
) -> HttpResponse {
    let back = |key: &str, value: &str| mailbox_list_redirect(&base_url.0, key, value);

    let pending = session.pending_workspace_link().get().unwrap_or_else(|e| {
        tracing::warn!(error.message = %e, "Unreadable pending workspace link");
        None
    });
    session.pending_workspace_link().remove();

    let pending = match pending {
        Some(pending) if !pending.is_expired(Utc::now()) => pending,
        _ => return back("error", "Authorization session expired. Please start over."),
    };

    let CallbackParams { code, state, error } = query.into_inner();
    if let Some(error) = error {
        return back("error", &format!("Google authorization failed: {error}"));
    }
    let code = match (code, state) {
        (Some(code), Some(state)) if state == pending.state => code,
        _ => return back("error", "Authorization state mismatch. Please start over."),
    };

    match link_mailbox(&pending, &code, &pool, &oauth, &gmail).await {
        Ok(()) => back("status", "linked"),
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to link a workspace mailbox");
            let invalid_client = e
                .downcast_ref::<OAuthError>()
                .is_some_and(OAuthError::is_invalid_client);
            let hint = if invalid_client {
                "Google OAuth invalid_client. Verify the client id, client secret and redirect URI."
            } else {
                "Unable to finalize Google authorization. Please try again."
            };
            back("error", hint)
        }
    }
}

async fn link_mailbox(
    pending: &PendingWorkspaceLink,
    code: &str,
    pool: &PgPool,
    oauth: &OAuthClient,
    gmail: &GmailApi,
) -> anyhow::Result<()> {
    let tokens = oauth.exchange_code(code).await?;
    let profile = gmail
        .get_profile(&tokens.access_token)
        .await
        .context("Failed to read the Gmail profile of the linked mailbox.")?;

    let mailbox = LinkedMailbox {
        email: &pending.email,
        display_name: &pending.display_name,
        google_account_id: &profile.email_address,
        created_by: pending.user_id,
    };
    let id = upsert_linked_mailbox(&mailbox, &tokens, pool).await?;
    tracing::info!(workspace_email_id = %id, "Linked workspace mailbox");
    Ok(())
}

fn mailbox_list_redirect(base_url: &str, key: &str, value: &str) -> HttpResponse {
    let target = format!("{}/admin/workspace-emails", base_url.trim_end_matches('/'));
    match Url::parse_with_params(&target, &[(key, value)]) {
        Ok(url) => utils::see_other(url.as_str()),
        Err(e) => {
            tracing::error!(error.message = %e, "Invalid application base url");
            utils::see_other("/admin/workspace-emails")
        }
    }
}
