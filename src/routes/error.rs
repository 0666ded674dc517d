use crate::{domain::FieldIssues, utils::error_chain_fmt};
use actix_web::{error::JsonPayloadError, http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use std::fmt::Debug;

/// Failure of a JSON endpoint, rendered as `{"message": ..., "issues": ...}`.
#[derive(thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Invalid {
        message: String,
        issues: Option<FieldIssues>,
    },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Something went wrong. Please try again.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            issues: None,
        }
    }

    pub fn with_issues(message: impl Into<String>, issues: FieldIssues) -> Self {
        Self::Invalid {
            message: message.into(),
            issues: Some(issues),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({ "message": self.to_string() });
        if let Self::Invalid {
            issues: Some(issues),
            ..
        } = self
        {
            body["issues"] = serde_json::json!(issues);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Installed on `web::JsonConfig` so malformed bodies get the JSON error shape.
pub fn json_error_handler(e: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error.message = %e, "Rejected a JSON body");
    match e {
        JsonPayloadError::Deserialize(e) if e.is_data() => {
            let mut issues = FieldIssues::new();
            issues.push("payload", e.to_string());
            ApiError::with_issues("Invalid payload.", issues).into()
        }
        _ => ApiError::invalid("Invalid JSON payload.").into(),
    }
}
