use crate::{reporting, routes::ApiError};
use actix_web::{get, web, HttpResponse};
use sqlx::PgPool;

#[get("/email-activity")]
#[tracing::instrument(name = "Show email activity", skip(pool))]
pub async fn email_activity_log(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let events = reporting::email_activity(&pool).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "events": events })))
}
