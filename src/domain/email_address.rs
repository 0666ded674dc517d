use serde::Serialize;
use validator::ValidateEmail;

const MAX_EMAIL_LENGTH: usize = 320;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(s: &str) -> Result<EmailAddress, String> {
        let s = s.trim();
        if s.chars().count() > MAX_EMAIL_LENGTH {
            return Err(format!(
                "Email must be under {} characters.",
                MAX_EMAIL_LENGTH
            ));
        }
        if s.validate_email() {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("{} is not a valid email address.", s))
        }
    }

    /// Account emails are matched case-insensitively.
    pub fn parse_lowercase(s: &str) -> Result<EmailAddress, String> {
        Self::parse(&s.trim().to_lowercase())
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
