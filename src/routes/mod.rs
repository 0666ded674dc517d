#![allow(hidden_glob_reexports)]
#![allow(clippy::async_yields_async)]
mod account;
mod admin;
mod api;
mod error;
mod health_check;
mod login;
mod otp;
mod team;

pub use account::*;
pub use admin::*;
pub use api::*;
pub use error::*;
pub use health_check::*;
pub use login::*;
pub use otp::*;
pub use team::*;

use actix_web_flash_messages::IncomingFlashMessages;
use std::fmt::Write;

/// Renders pending flash messages as escaped `<p><i>` lines.
pub fn flash_messages_html(flash_messages: &IncomingFlashMessages) -> String {
    let mut html = String::new();
    for m in flash_messages.iter() {
        let _ = writeln!(html, "<p><i>{}</i></p>", htmlescape::encode_minimal(m.content()));
    }
    html
}
