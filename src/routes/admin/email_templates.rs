use crate::{
    auth::UserId,
    domain::{TemplateDraft, TemplateDraftPayload},
    email_templates,
    routes::ApiError,
};
use actix_web::{get, post, web, HttpResponse};
use sqlx::PgPool;

#[get("/email-templates")]
#[tracing::instrument(name = "List email templates for admins", skip(pool))]
pub async fn admin_email_templates(pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let templates = email_templates::list_templates(pool.as_ref()).await?;
    Ok(HttpResponse::Ok().json(templates))
}

#[post("/email-templates")]
#[tracing::instrument(name = "Create an email template", skip(body, pool), fields(user_id = %*user_id))]
pub async fn create_email_template(
    body: web::Json<TemplateDraftPayload>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let draft = TemplateDraft::try_from(body.into_inner())
        .map_err(|issues| ApiError::with_issues("Invalid template.", issues))?;
    let template = email_templates::create_template(&draft, **user_id, pool.as_ref()).await?;
    Ok(HttpResponse::Created().json(template))
}
