use crate::{auth::UserId, reporting, routes::ApiError};
use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

#[get("/dashboard")]
#[tracing::instrument(name = "Show the team dashboard", skip(pool), fields(user_id = %*user_id))]
pub async fn team_dashboard(
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, ApiError> {
    let dashboard = reporting::team_dashboard(**user_id, Utc::now(), &pool).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}
