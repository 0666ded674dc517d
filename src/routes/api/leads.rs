use crate::{
    auth::{ApiKeyError, LeadIngestionKey},
    domain::{FieldIssues, LeadPayload, NewLead},
    leads::{self, UpsertLeadError, UpsertOutcome},
    utils::{error_chain_fmt, json_message},
};
use actix_web::{
    http::StatusCode,
    post,
    web::{self, Data},
    HttpRequest, HttpResponse, ResponseError,
};
use sqlx::PgPool;
use std::fmt::Debug;

#[derive(thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    AuthError(#[from] ApiKeyError),
    #[error("Invalid JSON payload.")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Invalid lead payload.")]
    InvalidPayload(FieldIssues),
    #[error("Unable to ingest lead at this time.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for IngestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidJson(_) | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
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

/// Lead sources push prospects here; a known email updates the existing lead.
#[post("/leads")]
#[tracing::instrument(
    name = "Ingest a lead",
    skip_all,
    fields(lead_id = tracing::field::Empty, outcome = tracing::field::Empty)
)]
pub async fn ingest_lead(
    req: HttpRequest,
    body: web::Bytes,
    pool: Data<PgPool>,
    api_key: Data<LeadIngestionKey>,
) -> Result<HttpResponse, IngestError> {
    api_key.authorize(req.headers())?;

    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(IngestError::InvalidJson)?;
    let payload: LeadPayload = serde_json::from_value(value).map_err(|e| {
        let mut issues = FieldIssues::new();
        issues.push("payload", e.to_string());
        IngestError::InvalidPayload(issues)
    })?;
    let new_lead = NewLead::try_from(payload).map_err(IngestError::InvalidPayload)?;

    let (lead, outcome) = match leads::upsert_lead(&new_lead, &pool).await {
        Ok(stored) => stored,
        Err(UpsertLeadError::UnknownAssignee) => {
            let mut issues = FieldIssues::new();
            issues.push("assignedTo", "Unknown team member.");
            return Err(IngestError::InvalidPayload(issues));
        }
        Err(UpsertLeadError::UnexpectedError(e)) => return Err(e.into()),
    };
    tracing::Span::current()
        .record("lead_id", tracing::field::display(lead.id))
        .record("outcome", tracing::field::debug(outcome));

    let status = match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::OK,
    };
    Ok(HttpResponse::build(status).json(serde_json::json!({
        "lead": lead,
        "status": outcome,
    })))
}
