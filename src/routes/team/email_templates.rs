use crate::{email_templates, routes::ApiError};
use actix_web::{get, web, HttpResponse};
use sqlx::PgPool;

#[get("/email-templates")]
#[tracing::instrument(name = "List email templates", skip(pool))]
pub async fn team_email_templates(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let templates = email_templates::list_templates(pool.as_ref()).await?;
    Ok(HttpResponse::Ok().json(templates))
}
