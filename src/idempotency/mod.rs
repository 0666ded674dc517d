mod persistence;

pub use persistence::{get_saved_response, save_response, try_processing, NextAction};

const MAX_KEY_LENGTH: usize = 50;

/// Client-chosen key that makes a send request safe to retry.
#[derive(Debug)]
pub struct IdempotencyKey(String);

impl TryFrom<String> for IdempotencyKey {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim().to_string();
        if s.is_empty() {
            anyhow::bail!("The idempotency key cannot be empty");
        }
        if s.chars().count() > MAX_KEY_LENGTH {
            anyhow::bail!(
                "The idempotency key must be shorter than {} characters",
                MAX_KEY_LENGTH
            );
        }
        Ok(Self(s))
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
