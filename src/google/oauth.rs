use crate::utils::error_chain_fmt;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

pub const GMAIL_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
];

/// Access tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: TimeDelta = TimeDelta::seconds(60);

/// Random value tying the consent redirect back to the session that started it.
pub fn generate_state_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Whether stored credentials must be refreshed before calling Gmail.
pub fn needs_refresh(
    access_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match (access_token, expires_at) {
        (None, _) | (_, None) => true,
        (Some(_), Some(expires_at)) => expires_at - REFRESH_MARGIN < now,
    }
}

#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(thiserror::Error)]
pub enum OAuthError {
    #[error("Google OAuth request was rejected: {error}")]
    Rejected {
        error: String,
        description: Option<String>,
    },
    #[error("Google OAuth response missing access token.")]
    MissingAccessToken,
    #[error(
        "Google OAuth response missing refresh token. \
        Ensure access_type=offline and prompt=consent."
    )]
    MissingRefreshToken,
    #[error("Failed to reach the Google OAuth token endpoint.")]
    Transport(#[from] reqwest::Error),
}

impl Debug for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl OAuthError {
    /// Misconfigured client id, secret or redirect URI.
    pub fn is_invalid_client(&self) -> bool {
        matches!(self, Self::Rejected { error, .. } if error == "invalid_client")
    }
}

pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: Url,
    auth_base_url: Url,
    token_url: Url,
}

impl OAuthClient {
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_uri: Url,
        auth_base_url: Url,
        token_url: Url,
        timeout: Duration,
    ) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            client_id,
            client_secret,
            redirect_uri,
            auth_base_url,
            token_url,
        }
    }

    /// Consent screen URL asking for offline Gmail access.
    pub fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> Url {
        let mut url = self.auth_base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", self.redirect_uri.as_str())
                .append_pair("response_type", "code")
                .append_pair("scope", &GMAIL_SCOPES.join(" "))
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent")
                .append_pair("state", state);
            if let Some(hint) = login_hint {
                query.append_pair("login_hint", hint);
            }
        }
        url
    }

    #[tracing::instrument(name = "Exchange OAuth code for tokens", skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, OAuthError> {
        let response = self
            .request_tokens(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        let refresh_token = response
            .refresh_token
            .clone()
            .map(SecretString::from)
            .ok_or(OAuthError::MissingRefreshToken)?;
        token_set(response, refresh_token, Utc::now())
    }

    /// Google usually omits the refresh token here; the old one stays valid then.
    #[tracing::instrument(name = "Refresh OAuth access token", skip_all)]
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenSet, OAuthError> {
        let response = self
            .request_tokens(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;
        let refresh_token = response
            .refresh_token
            .clone()
            .map(SecretString::from)
            .unwrap_or_else(|| refresh_token.clone());
        token_set(response, refresh_token, Utc::now())
    }

    async fn request_tokens(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        form.extend_from_slice(grant);

        let response = self.http.post(self.token_url.clone()).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let rejection = serde_json::from_str::<TokenErrorResponse>(&body).unwrap_or(
                TokenErrorResponse {
                    error: format!("http_{}", status.as_u16()),
                    error_description: Some(body),
                },
            );
            tracing::warn!(
                error = %rejection.error,
                description = ?rejection.error_description,
                "Google OAuth token endpoint rejected the request"
            );
            return Err(OAuthError::Rejected {
                error: rejection.error,
                description: rejection.error_description,
            });
        }

        Ok(response.json().await?)
    }
}

fn token_set(
    response: TokenResponse,
    refresh_token: SecretString,
    now: DateTime<Utc>,
) -> Result<TokenSet, OAuthError> {
    let access_token = response
        .access_token
        .map(SecretString::from)
        .ok_or(OAuthError::MissingAccessToken)?;
    Ok(TokenSet {
        access_token,
        refresh_token,
        expires_at: response
            .expires_in
            .map(|seconds| now + TimeDelta::seconds(seconds)),
        scope: response.scope,
        token_type: response.token_type,
    })
}
