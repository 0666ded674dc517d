use actix_web::http::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

/// Shared secret that lead sources present to the ingestion API.
#[derive(Clone)]
pub struct LeadIngestionKey(pub SecretString);

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ApiKeyError {
    #[error("Missing API key.")]
    Missing,
    #[error("Unauthorized")]
    Invalid,
}

/// `x-api-key` wins; otherwise `Authorization`, with or without a `Bearer ` prefix.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))?
        .to_str()
        .ok()?
        .trim();
    let key = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!key.is_empty()).then(|| key.to_string())
}

impl LeadIngestionKey {
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiKeyError> {
        let provided = extract_api_key(headers).ok_or(ApiKeyError::Missing)?;
        if provided.as_bytes() == self.0.expose_secret().as_bytes() {
            Ok(())
        } else {
            Err(ApiKeyError::Invalid)
        }
    }
}
