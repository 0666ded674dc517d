use crate::utils::error_chain_fmt;
use reqwest::{Client, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

#[derive(thiserror::Error)]
pub enum GmailError {
    #[error("Gmail API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Failed to reach the Gmail API.")]
    Transport(#[from] reqwest::Error),
}

impl Debug for GmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GmailProfile {
    pub email_address: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: Option<String>,
    pub thread_id: Option<String>,
}

/// Thin client over the `users/me` Gmail endpoints, authenticated per call
/// with the access token of the mailbox being used.
pub struct GmailApi {
    http: Client,
    base_url: Url,
}

impl GmailApi {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/me/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    #[tracing::instrument(name = "Fetch Gmail profile", skip_all)]
    pub async fn get_profile(&self, access_token: &SecretString) -> Result<GmailProfile, GmailError> {
        let response = self
            .http
            .get(self.endpoint("profile"))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// `raw` is a complete RFC 5322 message, base64url encoded.
    #[tracing::instrument(name = "Send Gmail message", skip_all)]
    pub async fn send_raw(
        &self,
        access_token: &SecretString,
        raw: &str,
    ) -> Result<SentMessage, GmailError> {
        let response = self
            .http
            .post(self.endpoint("messages/send"))
            .bearer_auth(access_token.expose_secret())
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response, GmailError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GmailError::Api {
        status: status.as_u16(),
        body,
    })
}
