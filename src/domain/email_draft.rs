use super::{EmailAddress, FieldIssues};
use serde::Deserialize;
use uuid::Uuid;

/// RFC 5322 line limit, which Gmail enforces on the subject header.
const MAX_SUBJECT_LENGTH: usize = 998;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraftPayload {
    pub lead_id: Option<String>,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub cc: Option<Vec<String>>,
    pub bcc: Option<Vec<String>>,
    pub reply_to: Option<String>,
    pub workspace_email_id: Option<String>,
}

/// An outbound email to a lead, ready to be rendered as MIME.
#[derive(Debug, Clone)]
pub struct EmailDraft {
    pub lead_id: Uuid,
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Option<EmailAddress>,
    pub workspace_email_id: Option<Uuid>,
}

fn parse_uuid(issues: &mut FieldIssues, field: &'static str, value: Option<&str>) -> Option<Uuid> {
    let id = Uuid::parse_str(value?).ok();
    if id.is_none() {
        issues.push(field, "Invalid uuid");
    }
    id
}

fn parse_recipients(
    issues: &mut FieldIssues,
    field: &'static str,
    message: &str,
    values: Option<Vec<String>>,
) -> Vec<EmailAddress> {
    let mut recipients = Vec::new();
    for value in values.unwrap_or_default() {
        match EmailAddress::parse(&value) {
            Ok(address) => recipients.push(address),
            Err(_) => issues.push(field, message),
        }
    }
    recipients
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<EmailDraftPayload> for EmailDraft {
    type Error = FieldIssues;

    fn try_from(payload: EmailDraftPayload) -> Result<Self, Self::Error> {
        let mut issues = FieldIssues::new();

        if payload.lead_id.is_none() {
            issues.push("leadId", "Required");
        }
        let lead_id = parse_uuid(&mut issues, "leadId", payload.lead_id.as_deref());

        let subject = payload.subject.unwrap_or_default().trim().to_string();
        if subject.is_empty() {
            issues.push("subject", "Subject is required.");
        } else if subject.chars().count() > MAX_SUBJECT_LENGTH {
            issues.push("subject", "Subject is too long.");
        }

        let text_body = non_empty(payload.text_body);
        let html_body = non_empty(payload.html_body);
        if text_body.is_none() && html_body.is_none() {
            issues.push(
                "body",
                "Provide either textBody or htmlBody for the email content.",
            );
        }

        let cc = parse_recipients(&mut issues, "cc", "Invalid CC email address.", payload.cc);
        let bcc = parse_recipients(&mut issues, "bcc", "Invalid BCC email address.", payload.bcc);

        let reply_to = match payload.reply_to.as_deref().map(EmailAddress::parse) {
            Some(Ok(address)) => Some(address),
            Some(Err(_)) => {
                issues.push("replyTo", "Invalid reply-to address.");
                None
            }
            None => None,
        };
        let workspace_email_id = parse_uuid(
            &mut issues,
            "workspaceEmailId",
            payload.workspace_email_id.as_deref(),
        );

        match lead_id {
            Some(lead_id) if issues.is_empty() => Ok(EmailDraft {
                lead_id,
                subject,
                text_body,
                html_body,
                cc,
                bcc,
                reply_to,
                workspace_email_id,
            }),
            _ => Err(issues),
        }
    }
}
