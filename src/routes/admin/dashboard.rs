use crate::{reporting, routes::ApiError};
use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

#[get("/dashboard")]
#[tracing::instrument(name = "Show the admin dashboard", skip(pool))]
pub async fn admin_dashboard(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let dashboard = reporting::admin_dashboard(Utc::now(), &pool).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}
