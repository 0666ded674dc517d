use crate::{
    auth::{self, AuthError, Credentials, UserId},
    domain::ValidPassword,
    routes::flash_messages_html,
    utils,
};
use actix_web::{get, http::header::ContentType, post, web, HttpResponse, Responder};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

#[get("/password")]
pub async fn change_password_form(flash_messages: IncomingFlashMessages) -> impl Responder {
    let msg_html = flash_messages_html(&flash_messages);
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!(
            r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Change password</title>
</head>
<body>
    {msg_html}
    <form action="/account/password" method="post">
        <label>Current password
            <input type="password" name="current_password">
        </label>
        <br>
        <label>New password
            <input type="password" name="new_password">
        </label>
        <br>
        <label>Confirm new password
            <input type="password" name="new_password_check">
        </label>
        <br>
        <button type="submit">Change password</button>
    </form>
</body>
</html>
        "#
        ))
}

#[derive(serde::Deserialize)]
struct FormData {
    current_password: SecretString,
    new_password: SecretString,
    new_password_check: SecretString,
}

#[post("/password")]
#[tracing::instrument(skip(form, pool), fields(user_id = %*user_id))]
pub async fn change_password(
    form: web::Form<FormData>,
    pool: web::Data<PgPool>,
    user_id: web::ReqData<UserId>,
) -> actix_web::Result<impl Responder> {
    let user_id = user_id.into_inner();
    let FormData {
        current_password,
        new_password,
        new_password_check,
    } = form.0;

    if new_password.expose_secret() != new_password_check.expose_secret() {
        FlashMessage::error(
            "You entered two different new passwords - the field values must match.",
        )
        .send();
        return Ok(utils::see_other("/account/password"));
    }

    let new_password = match ValidPassword::parse(new_password) {
        Ok(p) => p,
        Err(e) => {
            FlashMessage::error(e.to_string()).send();
            return Ok(utils::see_other("/account/password"));
        }
    };

    let user = auth::get_user(*user_id, pool.as_ref())
        .await
        .map_err(utils::e500)?
        .ok_or_else(|| utils::e500("The signed-in user no longer exists."))?;
    let credentials = Credentials {
        email: user.email,
        password: current_password,
    };

    if let Err(e) = auth::validate_credentials(credentials, pool.as_ref()).await {
        return match e {
            AuthError::UnexpectedError(_) => Err(utils::e500(e)),
            AuthError::InvalidCredentials(_) => {
                FlashMessage::error("The current password is incorrect.").send();
                Ok(utils::see_other("/account/password"))
            }
        };
    }

    auth::change_password(*user_id, new_password, pool.as_ref())
        .await
        .map_err(utils::e500)?;

    FlashMessage::info("Your password has been changed.").send();
    Ok(utils::see_other("/account/password"))
}
