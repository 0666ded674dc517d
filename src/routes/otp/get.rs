use crate::{routes::flash_messages_html, session_state::Session, utils};
use actix_web::{get, http::header::ContentType, HttpResponse, Responder};
use actix_web_flash_messages::IncomingFlashMessages;
use chrono::Utc;

/// Second login step. Only reachable with a live pending login.
#[get("/otp")]
pub async fn otp_form(
    flash_messages: IncomingFlashMessages,
    session: Session,
) -> actix_web::Result<impl Responder> {
    let pending = session.pending_login().get().map_err(utils::e500)?;
    let email = match pending {
        Some(pending) if !pending.is_expired(Utc::now()) => pending.email,
        _ => return Ok(utils::see_other("/login")),
    };
    let email = htmlescape::encode_minimal(&email);
    let msg_html = flash_messages_html(&flash_messages);

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!(
            r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Enter your code</title>
</head>
<body>
    {msg_html}
    <p>We sent a 6-digit code to {email}.</p>
    <form action="/otp" method="post">
        <label>One-time passcode
                <input type="text" name="otp" inputmode="numeric" maxlength="6" autocomplete="one-time-code">
        </label>

        <button type="submit">Verify</button>
    </form>
</body>
</html>
        "#
        )))
}
