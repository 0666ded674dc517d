use crate::{domain::EmailAddress, email_client::EmailClient};
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, SecretString};

const TEMPORARY_PASSWORD_LENGTH: usize = 20;

/// Random alphanumeric password handed out with an invite.
pub fn generate_temporary_password() -> SecretString {
    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    SecretString::from(password)
}

/// Replies go to the admin who sent the invite.
#[tracing::instrument(name = "Send invite email", skip(email_client, login_url, temporary_password))]
pub async fn send_invite_email(
    email_client: &EmailClient,
    recipient: &EmailAddress,
    inviter: &EmailAddress,
    login_url: &str,
    temporary_password: &SecretString,
) -> Result<(), reqwest::Error> {
    let password = temporary_password.expose_secret();
    let subject = "You have been invited to Lead CRM";
    let text_body = format!(
        "Hi,\n\n{inviter} invited you to join Lead CRM as a team member.\n\n\
        Sign in at {login_url} with:\n\
        Email: {recipient}\n\
        Temporary password: {password}\n\n\
        Change the password from your account page once you are in."
    );
    let html_body = format!(
        "<p>Hi,</p>\
        <p>{inviter} invited you to join Lead CRM as a team member.</p>\
        <p>Sign in at <a href=\"{url}\">{url}</a> with:</p>\
        <p>Email: {recipient}<br>Temporary password: <code>{password}</code></p>\
        <p>Change the password from your account page once you are in.</p>",
        inviter = htmlescape::encode_minimal(inviter.as_ref()),
        url = htmlescape::encode_attribute(login_url),
        recipient = htmlescape::encode_minimal(recipient.as_ref()),
    );
    email_client
        .send_email(recipient, subject, &html_body, &text_body, Some(inviter))
        .await
}
