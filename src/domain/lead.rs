use super::{EmailAddress, FieldIssues};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 255;
const MAX_COMPANY_LENGTH: usize = 255;
const MAX_PHONE_LENGTH: usize = 50;

#[derive(Debug, Clone)]
pub struct LeadName(String);

impl LeadName {
    pub fn parse(s: &str) -> Result<LeadName, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Lead name is required.".into());
        }
        if s.graphemes(true).count() > MAX_NAME_LENGTH {
            return Err(format!(
                "Lead name must be under {} characters.",
                MAX_NAME_LENGTH
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for LeadName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position of a lead in the sales pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
    /// Set automatically once an email went out through a workspace mailbox.
    #[serde(rename = "email-send")]
    EmailSent,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 8] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::Won,
        Self::Lost,
        Self::EmailSent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::EmailSent => "email-send",
        }
    }

    /// Won and lost leads are closed.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Won | Self::Lost)
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("{} is not a valid lead status.", s))
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw body accepted by the ingestion API.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
    pub source: Option<serde_json::Map<String, serde_json::Value>>,
    pub assigned_to: Option<String>,
}

#[derive(Debug)]
pub struct NewLead {
    pub name: LeadName,
    pub email: Option<EmailAddress>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub message: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<serde_json::Value>,
    pub assigned_to: Option<Uuid>,
}

fn bounded(value: Option<String>, max: usize, message: &str) -> Result<Option<String>, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.chars().count() > max => Err(message.to_string()),
        other => Ok(other),
    }
}

impl TryFrom<LeadPayload> for NewLead {
    type Error = FieldIssues;

    fn try_from(payload: LeadPayload) -> Result<Self, Self::Error> {
        let mut issues = FieldIssues::new();

        let name = match payload.name.as_deref().map(LeadName::parse) {
            Some(Ok(name)) => Some(name),
            Some(Err(e)) => {
                issues.push("name", e);
                None
            }
            None => {
                issues.push("name", "Lead name is required.");
                None
            }
        };
        let email = match payload.email.as_deref().map(EmailAddress::parse) {
            Some(Ok(email)) => Some(email),
            Some(Err(e)) => {
                issues.push("email", e);
                None
            }
            None => None,
        };
        let company = bounded(
            payload.company,
            MAX_COMPANY_LENGTH,
            "Company name must be under 255 characters.",
        )
        .unwrap_or_else(|e| {
            issues.push("company", e);
            None
        });
        let phone = bounded(
            payload.phone,
            MAX_PHONE_LENGTH,
            "Phone must be under 50 characters.",
        )
        .unwrap_or_else(|e| {
            issues.push("phone", e);
            None
        });
        let status = match payload.status.as_deref().map(LeadStatus::from_str) {
            Some(Ok(status)) => Some(status),
            Some(Err(e)) => {
                issues.push("status", e);
                None
            }
            None => None,
        };
        let assigned_to = match payload.assigned_to.as_deref().map(Uuid::parse_str) {
            Some(Ok(id)) => Some(id),
            Some(Err(_)) => {
                issues.push("assignedTo", "Invalid uuid.");
                None
            }
            None => None,
        };

        match name {
            Some(name) if issues.is_empty() => Ok(NewLead {
                name,
                email,
                company,
                phone,
                notes: payload.notes,
                message: payload.message,
                status,
                source: payload.source.map(serde_json::Value::Object),
                assigned_to,
            }),
            _ => Err(issues),
        }
    }
}
