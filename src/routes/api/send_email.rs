use crate::{
    domain::{EmailDraft, EmailDraftPayload, FieldIssues},
    google::{GmailApi, OAuthClient},
    idempotency::{self, IdempotencyKey, NextAction},
    outreach::{self, SendEmailError},
    session_state::Session,
};
use actix_web::{
    post,
    web::{self, Data},
    HttpRequest, HttpResponse,
};
use anyhow::Context;
use sqlx::PgPool;

#[post("/send-email")]
#[tracing::instrument(name = "Send an email to a lead", skip_all, fields(user_id = tracing::field::Empty))]
pub async fn send_email_to_lead(
    req: HttpRequest,
    body: web::Bytes,
    session: Session,
    pool: Data<PgPool>,
    oauth: Data<OAuthClient>,
    gmail: Data<GmailApi>,
) -> Result<HttpResponse, SendEmailError> {
    let user_id = session
        .user_id()
        .get()
        .context("Failed to read the session.")?
        .ok_or(SendEmailError::Unauthorized)?;
    tracing::Span::current().record("user_id", tracing::field::display(user_id));

    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(SendEmailError::InvalidJson)?;
    let payload: EmailDraftPayload = serde_json::from_value(value).map_err(|e| {
        let mut issues = FieldIssues::new();
        issues.push("payload", e.to_string());
        SendEmailError::InvalidPayload(issues)
    })?;
    let draft = EmailDraft::try_from(payload).map_err(SendEmailError::InvalidPayload)?;

    let Some(idempotency_key) = read_idempotency_key(&req)? else {
        let sent = outreach::send_lead_email(user_id, draft, &pool, &oauth, &gmail).await?;
        return Ok(HttpResponse::Ok().json(sent));
    };

    let txn = match idempotency::try_processing(user_id, &idempotency_key, &pool).await? {
        NextAction::StartProcessing(txn) => txn,
        NextAction::ReturnSavedResponse(saved) => return Ok(saved),
    };
    let sent = outreach::send_lead_email(user_id, draft, &pool, &oauth, &gmail).await?;
    let response = idempotency::save_response(
        HttpResponse::Ok().json(sent),
        user_id,
        &idempotency_key,
        txn,
    )
    .await?;
    Ok(response)
}

fn read_idempotency_key(req: &HttpRequest) -> Result<Option<IdempotencyKey>, SendEmailError> {
    let Some(value) = req.headers().get("Idempotency-Key") else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(anyhow::Error::new)
        .and_then(|v| IdempotencyKey::try_from(v.to_string()))
        .map_err(|e| {
            let mut issues = FieldIssues::new();
            issues.push("idempotencyKey", e.to_string());
            SendEmailError::InvalidPayload(issues)
        })?;
    Ok(Some(key))
}
