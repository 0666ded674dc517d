use super::FieldIssues;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static BLOCK_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(p|div|section|h[1-6])>").unwrap());
static LIST_ITEM_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li>\s*").unwrap());
static LIST_ITEM_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</li>").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static LIST_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</ul>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\n").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static RUNS_OF_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Derive the plain-text alternative of a template body.
pub fn html_to_plain_text(html: &str) -> String {
    let text = BLOCK_TAGS.replace_all(html, "\n\n");
    let text = LIST_ITEM_OPEN.replace_all(&text, "- ");
    let text = LIST_ITEM_CLOSE.replace_all(&text, "\n");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = LIST_CLOSE.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = text.replace('\u{a0}', " ");
    let text = TRAILING_SPACE.replace_all(&text, "\n");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    let text = RUNS_OF_SPACES.replace_all(&text, " ");
    text.trim().to_string()
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraftPayload {
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug)]
pub struct TemplateDraft {
    pub template_name: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
}

fn check_length(
    issues: &mut FieldIssues,
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len < min {
        issues.push(field, format!("{label} must be at least {min} characters."));
    } else if len > max {
        issues.push(field, format!("{label} must be {max} characters or fewer."));
    }
}

impl TryFrom<TemplateDraftPayload> for TemplateDraft {
    type Error = FieldIssues;

    fn try_from(payload: TemplateDraftPayload) -> Result<Self, Self::Error> {
        let template_name = payload.template_name.trim().to_string();
        let subject = payload.subject.trim().to_string();
        let body = payload.body.trim().to_string();

        let mut issues = FieldIssues::new();
        check_length(&mut issues, "templateName", "Template name", &template_name, 3, 120);
        check_length(&mut issues, "subject", "Subject", &subject, 3, 200);
        if body.is_empty() {
            issues.push("body", "Email body cannot be empty.");
        }
        if !issues.is_empty() {
            return Err(issues);
        }

        let body_text = html_to_plain_text(&body);
        Ok(Self {
            template_name,
            subject,
            body_html: body,
            body_text,
        })
    }
}
