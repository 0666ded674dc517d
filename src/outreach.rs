//! Sending a lead an email from a linked Google Workspace mailbox.

use crate::{
    auth::get_user,
    domain::{EmailAddress, EmailDraft, FieldIssues, LeadStatus, Role},
    google::{GmailApi, Mailbox, MimeError, MimeMessage, OAuthClient},
    leads::{self, EventType, NewLeadEvent},
    utils::{error_chain_fmt, json_message},
    workspace_emails::{fresh_access_token, get_workspace_email},
};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use std::fmt::Debug;
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum SendEmailError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid JSON payload.")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Invalid email payload.")]
    InvalidPayload(FieldIssues),
    #[error("Lead not found.")]
    LeadNotFound,
    #[error("Lead does not have an email address.")]
    LeadWithoutEmail,
    #[error("No workspace email assigned. Please contact an administrator.")]
    NoWorkspaceAssigned,
    #[error("You can only send email from your assigned workspace mailbox.")]
    ForeignWorkspace,
    #[error("The selected workspace email is unavailable. Please contact an administrator.")]
    WorkspaceUnavailable,
    #[error("{0}")]
    InvalidMessage(#[from] MimeError),
    #[error("Unable to send email right now.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for SendEmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SendEmailError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::LeadNotFound => StatusCode::NOT_FOUND,
            Self::ForeignWorkspace => StatusCode::FORBIDDEN,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidJson(_)
            | Self::InvalidPayload(_)
            | Self::LeadWithoutEmail
            | Self::NoWorkspaceAssigned
            | Self::WorkspaceUnavailable
            | Self::InvalidMessage(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::InvalidPayload(issues) => serde_json::json!({
                "message": self.to_string(),
                "issues": issues,
            }),
            _ => json_message(self),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEmail {
    pub success: bool,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
}

/// The mailbox to send from: the requested one, else the sender's own.
/// Team members may only ever use their own.
fn resolve_workspace(
    role: Role,
    assigned: Option<Uuid>,
    requested: Option<Uuid>,
) -> Result<Uuid, SendEmailError> {
    let resolved = requested.or(assigned).ok_or(SendEmailError::NoWorkspaceAssigned)?;
    if role == Role::Team && requested.is_some() && requested != assigned {
        return Err(SendEmailError::ForeignWorkspace);
    }
    Ok(resolved)
}

#[tracing::instrument(
    name = "Send email to lead",
    skip(draft, pool, oauth, gmail),
    fields(lead_id = %draft.lead_id, workspace_email_id = tracing::field::Empty, gmail_message_id = tracing::field::Empty)
)]
pub async fn send_lead_email(
    sender_id: Uuid,
    draft: EmailDraft,
    pool: &PgPool,
    oauth: &OAuthClient,
    gmail: &GmailApi,
) -> Result<SentEmail, SendEmailError> {
    let sender = get_user(sender_id, pool)
        .await?
        .context("The signed-in user no longer exists.")?;

    let lead = leads::get_lead(draft.lead_id, pool)
        .await?
        .ok_or(SendEmailError::LeadNotFound)?;
    let recipient = lead
        .email
        .as_deref()
        .ok_or(SendEmailError::LeadWithoutEmail)?;
    let recipient = EmailAddress::parse(recipient)
        .map_err(anyhow::Error::msg)
        .context("The lead has a malformed email address.")?;

    let workspace_id = resolve_workspace(
        sender.role,
        sender.workspace_email_id,
        draft.workspace_email_id,
    )?;
    tracing::Span::current().record("workspace_email_id", tracing::field::display(workspace_id));

    let mut workspace = match get_workspace_email(workspace_id, pool).await? {
        Some(workspace) if workspace.is_active => workspace,
        _ => return Err(SendEmailError::WorkspaceUnavailable),
    };
    let access_token = fresh_access_token(&mut workspace, oauth, pool)
        .await
        .context("Failed to obtain a Gmail access token.")?;

    let from = Mailbox {
        address: EmailAddress::parse(&workspace.email)
            .map_err(anyhow::Error::msg)
            .context("The workspace mailbox has a malformed address.")?,
        display_name: workspace.display_name.clone(),
    };
    let raw = MimeMessage::new(from, recipient.clone(), draft.subject.clone())
        .cc(draft.cc.clone())
        .bcc(draft.bcc.clone())
        .reply_to(draft.reply_to.clone())
        .text(draft.text_body.clone())
        .html(draft.html_body.clone())
        .to_gmail_raw()?;

    let sent = gmail
        .send_raw(&access_token, &raw)
        .await
        .context("Failed to send the Gmail message.")?;
    if let Some(id) = &sent.id {
        tracing::Span::current().record("gmail_message_id", tracing::field::display(id));
    }

    let event = NewLeadEvent {
        lead_id: lead.id,
        actor_id: Some(sender.id),
        workspace_email_id: Some(workspace.id),
        event_type: EventType::EmailSent,
        payload: serde_json::json!({
            "leadId": lead.id,
            "subject": draft.subject,
            "to": recipient,
            "cc": draft.cc,
            "bcc": draft.bcc,
            "workspaceEmailId": workspace.id,
            "gmailMessageId": sent.id,
            "textBody": draft.text_body,
            "htmlBody": draft.html_body,
            "sentAt": Utc::now(),
        }),
    };
    if let Err(e) = leads::record_event(&event, pool).await {
        tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to record the email_sent event");
    }
    if let Err(e) = leads::set_status(lead.id, LeadStatus::EmailSent, pool).await {
        tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to update the lead status");
    }

    Ok(SentEmail {
        success: true,
        message_id: sent.id,
        thread_id: sent.thread_id,
    })
}
