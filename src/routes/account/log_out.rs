use crate::{session_state::Session, utils};
use actix_web::{post, Responder};
use actix_web_flash_messages::FlashMessage;

#[post("/logout")]
pub async fn logout(session: Session) -> actix_web::Result<impl Responder> {
    if session.user_id().get().map_err(utils::e500)?.is_some() {
        FlashMessage::info("You have successfully logged out.").send();
    }
    session.logout();

    Ok(utils::see_other("/login"))
}
