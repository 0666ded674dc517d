use super::user::get_user;
use crate::{session_state::Session, utils};
use actix_web::middleware::Next;
use actix_web::{
    body::MessageBody,
    dev::ServiceRequest,
    dev::ServiceResponse,
    error::InternalError,
    web, FromRequest, HttpMessage,
};
use sqlx::PgPool;
use std::{fmt::Display, ops::Deref};
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub struct UserId(Uuid);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Deref for UserId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Only lets through sessions that completed both login steps.
pub async fn reject_anonymous_users(
    mut req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let session = {
        let (req, payload) = req.parts_mut();
        Session::from_request(req, payload).await
    }?;

    match session.user_id().get().map_err(utils::e500)? {
        Some(user_id) => {
            req.extensions_mut().insert(UserId(user_id));
            next.call(req).await
        }
        None => {
            let resp = utils::see_other("/login");
            let e = anyhow::anyhow!("The user has not logged in");
            Err(InternalError::from_response(e, resp).into())
        }
    }
}

/// Must run inside `reject_anonymous_users`.
pub async fn reject_non_admins(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let user_id = req
        .extensions()
        .get::<UserId>()
        .copied()
        .ok_or_else(|| utils::e500("Missing user id in request extensions"))?;
    let pool = req
        .app_data::<web::Data<PgPool>>()
        .cloned()
        .ok_or_else(|| utils::e500("Missing database pool"))?;

    let user = get_user(*user_id, pool.as_ref())
        .await
        .map_err(utils::e500)?;

    match user {
        Some(user) if user.is_admin() => next.call(req).await,
        Some(_) => Err(utils::e403("Only admins can access this resource.")),
        None => {
            let resp = utils::see_other("/login");
            let e = anyhow::anyhow!("The session refers to a deleted user");
            Err(InternalError::from_response(e, resp).into())
        }
    }
}
