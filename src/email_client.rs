use crate::domain::EmailAddress;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Transactional email provider used for OTP delivery.
pub struct EmailClient {
    client: Client,
    url: Url,
    sender: EmailAddress,
    auth_token: SecretString,
}

impl EmailClient {
    pub fn new(url: Url, sender: EmailAddress, auth_token: SecretString, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            sender,
            auth_token,
        }
    }

    #[tracing::instrument(name = "Send transactional email", skip_all, fields(recipient = %recipient))]
    pub async fn send_email(
        &self,
        recipient: &EmailAddress,
        subject: &str,
        html_body: &str,
        text_body: &str,
        reply_to: Option<&EmailAddress>,
    ) -> Result<(), reqwest::Error> {
        let body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: [recipient.as_ref()],
            subject,
            html: html_body,
            text: text_body,
            reply_to: reply_to.map(AsRef::as_ref),
        };

        let url = format!("{}/emails", self.url.as_str().trim_end_matches('/'));

        self.client
            .post(url)
            .bearer_auth(self.auth_token.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}
