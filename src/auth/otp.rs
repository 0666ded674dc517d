use crate::{
    domain::{EmailAddress, OtpCode},
    email_client::EmailClient,
    utils::error_chain_fmt,
};
use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::fmt::Debug;
use uuid::Uuid;

pub const OTP_TTL: TimeDelta = TimeDelta::minutes(5);

#[derive(thiserror::Error)]
pub enum OtpError {
    #[error("No active OTP found. Request a new code.")]
    NoActiveOtp,
    #[error("The OTP has expired. Please request a new code.")]
    Expired,
    #[error("Incorrect OTP. Please try again.")]
    Incorrect,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for OtpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Uniformly random, zero-padded six digit code.
pub fn generate_otp() -> SecretString {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    SecretString::from(format!("{code:06}"))
}

/// Only this digest is ever stored.
pub fn hash_otp(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Replaces any outstanding code for the user with a fresh one.
#[tracing::instrument(name = "Issue OTP", skip(pool))]
pub async fn issue_otp(user_id: Uuid, pool: &PgPool) -> anyhow::Result<SecretString> {
    let code = generate_otp();
    let expires_at = Utc::now() + OTP_TTL;

    let mut txn = pool.begin().await.context("Failed to begin a transaction.")?;
    sqlx::query("DELETE FROM otp_requests WHERE user_id = $1")
        .bind(user_id)
        .execute(txn.as_mut())
        .await
        .context("Failed to clear previous OTP requests.")?;
    sqlx::query(
        r#"
        INSERT INTO otp_requests (id, user_id, otp_code_hash, expires_at, consumed)
        VALUES ($1, $2, $3, $4, false)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(hash_otp(code.expose_secret()))
    .bind(expires_at)
    .execute(txn.as_mut())
    .await
    .context("Failed to store the OTP request.")?;
    txn.commit().await.context("Failed to commit the OTP request.")?;

    Ok(code)
}

#[derive(sqlx::FromRow)]
struct OtpRequest {
    id: Uuid,
    otp_code_hash: String,
    expires_at: DateTime<Utc>,
}

#[tracing::instrument(name = "Verify OTP", skip(code, pool))]
pub async fn verify_otp(
    user_id: Uuid,
    code: &OtpCode,
    now: DateTime<Utc>,
    pool: &PgPool,
) -> Result<(), OtpError> {
    let request = sqlx::query_as::<_, OtpRequest>(
        r#"
        SELECT id, otp_code_hash, expires_at
        FROM otp_requests
        WHERE user_id = $1 AND consumed = false
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch the active OTP request.")?
    .ok_or(OtpError::NoActiveOtp)?;

    check_otp(&request, code, now)?;

    // Concurrent submissions of the same code race here; only one flips the flag.
    let consumed =
        sqlx::query("UPDATE otp_requests SET consumed = true WHERE id = $1 AND consumed = false")
            .bind(request.id)
            .execute(pool)
            .await
            .context("Failed to mark the OTP as consumed.")?;
    if consumed.rows_affected() == 0 {
        return Err(OtpError::NoActiveOtp);
    }

    Ok(())
}

fn check_otp(request: &OtpRequest, code: &OtpCode, now: DateTime<Utc>) -> Result<(), OtpError> {
    if request.expires_at < now {
        return Err(OtpError::Expired);
    }
    if hash_otp(code.as_ref()) != request.otp_code_hash {
        return Err(OtpError::Incorrect);
    }
    Ok(())
}

#[tracing::instrument(name = "Send OTP email", skip(email_client, code))]
pub async fn send_otp_email(
    email_client: &EmailClient,
    recipient: &EmailAddress,
    code: &SecretString,
) -> Result<(), reqwest::Error> {
    let code = code.expose_secret();
    let subject = "Your Lead CRM one-time passcode";
    let text_body = format!(
        "Hi,\n\nUse the following one-time passcode to finish signing in: {code}\n\n\
        This code expires in 5 minutes. If you did not request it, you can ignore this email."
    );
    let html_body = format!(
        "<p>Hi,</p>\
        <p>Use the following one-time passcode to finish signing in:</p>\
        <p style=\"font-size: 24px; font-weight: bold; letter-spacing: 2px;\">{code}</p>\
        <p>This code expires in 5 minutes. If you did not request it, you can ignore this email.</p>"
    );
    email_client
        .send_email(recipient, subject, &html_body, &text_body, Some(recipient))
        .await
}
