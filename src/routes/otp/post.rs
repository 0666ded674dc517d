use crate::{
    auth::{self, OtpError},
    domain::OtpCode,
    session_state::Session,
    utils,
};
use actix_web::{error::InternalError, post, web, Responder};
use actix_web_flash_messages::FlashMessage;
use chrono::Utc;
use sqlx::PgPool;
use std::fmt::Debug;

#[derive(serde::Deserialize)]
struct FormData {
    otp: String,
}

#[post("/otp")]
#[tracing::instrument(skip(form, pool, session), fields(user_id = tracing::field::Empty))]
pub async fn submit_otp(
    form: web::Form<FormData>,
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<impl Responder, InternalError<OtpStepError>> {
    let code = OtpCode::parse(&form.0.otp)
        .map_err(|e| redirect(OtpStepError::InvalidInput(e), "/otp"))?;

    let pending = session
        .pending_login()
        .get()
        .map_err(|e| redirect(OtpStepError::UnexpectedError(e.into()), "/login"))?;
    let pending = match pending {
        Some(pending) if !pending.is_expired(Utc::now()) => pending,
        _ => {
            session.pending_login().remove();
            return Err(redirect(OtpStepError::SessionExpired, "/login"));
        }
    };
    tracing::Span::current().record("user_id", tracing::field::display(&pending.user_id));

    auth::verify_otp(pending.user_id, &code, Utc::now(), &pool)
        .await
        .map_err(|e| redirect(e.into(), "/otp"))?;

    let user = auth::get_user(pending.user_id, pool.as_ref())
        .await
        .map_err(|e| redirect(OtpStepError::UnexpectedError(e), "/login"))?
        .ok_or_else(|| redirect(OtpStepError::SessionExpired, "/login"))?;

    session.renew();
    session.pending_login().remove();
    session
        .user_id()
        .insert(user.id)
        .map_err(|e| redirect(OtpStepError::UnexpectedError(e.into()), "/login"))?;

    Ok(utils::see_other(user.role.home()))
}

fn redirect(e: OtpStepError, location: &str) -> InternalError<OtpStepError> {
    FlashMessage::error(e.to_string()).send();
    InternalError::from_response(e, utils::see_other(location))
}

#[derive(thiserror::Error)]
pub enum OtpStepError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Session expired. Please sign in again.")]
    SessionExpired,
    #[error(transparent)]
    Rejected(OtpError),
    #[error("Unable to validate OTP. Please try again.")]
    UnexpectedError(#[source] anyhow::Error),
}

impl From<OtpError> for OtpStepError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::UnexpectedError(e) => Self::UnexpectedError(e),
            e => Self::Rejected(e),
        }
    }
}

impl Debug for OtpStepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        utils::error_chain_fmt(self, f)
    }
}
