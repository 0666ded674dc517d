use crate::{
    auth::{self, AuthError, Credentials},
    domain::{EmailAddress, ValidPassword},
    email_client::EmailClient,
    session_state::{PendingLogin, Session},
    utils,
};
use actix_web::{error::InternalError, post, web, Responder};
use actix_web_flash_messages::FlashMessage;
use anyhow::Context;
use secrecy::SecretString;
use sqlx::PgPool;
use std::fmt::Debug;

#[derive(serde::Deserialize)]
struct FormData {
    email: String,
    password: SecretString,
}

/// First login step: check the password, then email a one-time code.
#[post("/login")]
#[tracing::instrument(
    skip(form, pool, email_client, session),
    fields(email = tracing::field::Empty, user_id = tracing::field::Empty)
)]
pub async fn login(
    form: web::Form<FormData>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    session: Session,
) -> Result<impl Responder, InternalError<LoginError>> {
    let FormData { email, password } = form.0;
    let email = EmailAddress::parse_lowercase(&email)
        .map_err(|_| login_redirect(LoginError::InvalidInput("Invalid email".into())))?;
    ValidPassword::check_login_shape(&password)
        .map_err(|e| login_redirect(LoginError::InvalidInput(e.to_string())))?;
    tracing::Span::current().record("email", tracing::field::display(&email));

    let credentials = Credentials {
        email: email.as_ref().to_string(),
        password,
    };
    let user_id = match auth::validate_credentials(credentials, pool.as_ref()).await {
        Ok(id) => id,
        Err(e) => {
            let e = match e {
                AuthError::InvalidCredentials(_) => LoginError::AuthError(e.into()),
                AuthError::UnexpectedError(_) => LoginError::UnexpectedError(e.into()),
            };
            return Err(login_redirect(e));
        }
    };
    tracing::Span::current().record("user_id", tracing::field::display(&user_id));

    session.pending_login().remove();
    session
        .pending_login()
        .insert(PendingLogin::new(user_id, email.as_ref().to_string()))
        .map_err(|e| login_redirect(LoginError::UnexpectedError(e.into())))?;

    if let Err(e) = dispatch_otp(user_id, &email, &pool, &email_client).await {
        session.pending_login().remove();
        return Err(login_redirect(LoginError::OtpDispatchError(e)));
    }

    Ok(utils::see_other("/otp"))
}

async fn dispatch_otp(
    user_id: uuid::Uuid,
    email: &EmailAddress,
    pool: &PgPool,
    email_client: &EmailClient,
) -> anyhow::Result<()> {
    let code = auth::issue_otp(user_id, pool).await?;
    auth::send_otp_email(email_client, email, &code)
        .await
        .context("Failed to send the OTP email.")
}

/// Redirect to the login page with an error message.
fn login_redirect(e: LoginError) -> InternalError<LoginError> {
    FlashMessage::error(e.to_string()).send();
    InternalError::from_response(e, utils::see_other("/login"))
}

#[derive(thiserror::Error)]
pub enum LoginError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid email or password.")]
    AuthError(#[source] anyhow::Error),
    #[error("Failed to send OTP. Please try again.")]
    OtpDispatchError(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        utils::error_chain_fmt(self, f)
    }
}
