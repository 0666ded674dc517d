mod assignment;
mod email_address;
mod email_draft;
mod full_name;
mod lead;
mod otp_code;
mod role;
mod template;
mod user_password;

pub use assignment::Assignment;
pub use email_address::EmailAddress;
pub use email_draft::{EmailDraft, EmailDraftPayload};
pub use full_name::FullName;
pub use lead::{LeadName, LeadPayload, LeadStatus, NewLead};
pub use otp_code::OtpCode;
pub use role::Role;
pub use template::{html_to_plain_text, TemplateDraft, TemplateDraftPayload};
pub use user_password::{ValidPassword, ValidPasswordError};

use serde::Serialize;
use std::collections::BTreeMap;

/// Validation messages grouped by the offending field.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FieldIssues(BTreeMap<&'static str, Vec<String>>);

impl FieldIssues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
