use actix_web::{http::header, HttpResponse};
use std::fmt::{Debug, Display};

pub fn e500(e: impl Debug + Display + 'static) -> actix_web::Error {
    actix_web::error::ErrorInternalServerError(e)
}

pub fn e403(e: impl Debug + Display + 'static) -> actix_web::Error {
    actix_web::error::ErrorForbidden(e)
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// `{"message": ...}` body used by every JSON error response.
pub fn json_message(message: impl Display) -> serde_json::Value {
    serde_json::json!({ "message": message.to_string() })
}
