use crate::routes::flash_messages_html;
use actix_web::{get, http::header::ContentType, HttpResponse, Responder};
use actix_web_flash_messages::IncomingFlashMessages;

#[get("/login")]
pub async fn login_form(flash_messages: IncomingFlashMessages) -> impl Responder {
    let msg_html = flash_messages_html(&flash_messages);
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!(
            r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sign in</title>
</head>
<body>
    {msg_html}
    <form action="/login" method="post">
        <label>Email
                <input type="email" name="email" placeholder="you@company.com">
        </label>

        <label>Password
                <input type="password" name="password" placeholder="Enter Password">
        </label>

        <button type="submit">Continue</button>
    </form>
</body>
</html>
        "#
        ))
}
