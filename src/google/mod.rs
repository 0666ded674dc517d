//! Google Workspace integration: the OAuth consent/token flow and the
//! subset of the Gmail API used to send mail from a linked mailbox.

mod gmail;
mod mime;
mod oauth;

pub use gmail::{GmailApi, GmailError, GmailProfile, SentMessage};
pub use mime::{Mailbox, MimeError, MimeMessage};
pub use oauth::{
    generate_state_token, needs_refresh, OAuthClient, OAuthError, TokenSet, GMAIL_SCOPES,
};
