use crate::domain::EmailAddress;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use rand::{distributions::Alphanumeric, Rng};
use std::fmt::{self, Display};

/// RFC 5322 hard limit on a header line, excluding the CRLF.
const MAX_LINE_LENGTH: usize = 998;
/// Base64 of 45 bytes keeps an encoded-word within the 75 characters RFC 2047 allows.
const ENCODED_WORD_BYTES: usize = 45;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MimeError {
    #[error("The {0} header must not contain line breaks.")]
    HeaderInjection(&'static str),
    #[error("A message needs a text or an HTML body.")]
    MissingBody,
}

/// An address with an optional display name, as used in `From:`.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub address: EmailAddress,
    pub display_name: Option<String>,
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                let name = encode_display_name(name, self.address.as_ref().len());
                write!(f, "{} <{}>", name, self.address)
            }
            _ => write!(f, "{}", self.address),
        }
    }
}

/// RFC 5322 message as accepted by `users.messages.send`.
#[derive(Debug, Clone)]
pub struct MimeMessage {
    from: Mailbox,
    to: EmailAddress,
    cc: Vec<EmailAddress>,
    bcc: Vec<EmailAddress>,
    reply_to: Option<EmailAddress>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
}

impl MimeMessage {
    pub fn new(from: Mailbox, to: EmailAddress, subject: impl Into<String>) -> Self {
        Self {
            from,
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: None,
            subject: subject.into(),
            text: None,
            html: None,
        }
    }

    pub fn cc(mut self, cc: Vec<EmailAddress>) -> Self {
        self.cc = cc;
        self
    }

    pub fn bcc(mut self, bcc: Vec<EmailAddress>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn reply_to(mut self, reply_to: Option<EmailAddress>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    pub fn html(mut self, html: Option<String>) -> Self {
        self.html = html;
        self
    }

    pub fn render(&self) -> Result<String, MimeError> {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        self.render_with_boundary(&format!("lead_crm_{boundary}"))
    }

    fn render_with_boundary(&self, boundary: &str) -> Result<String, MimeError> {
        reject_line_breaks("subject", &self.subject)?;
        if let Some(name) = &self.from.display_name {
            reject_line_breaks("from", name)?;
        }

        let mut headers = vec![
            format!("From: {}", self.from),
            format!("To: {}", self.to),
        ];
        if !self.cc.is_empty() {
            headers.push(format!("Cc: {}", join(&self.cc)));
        }
        if !self.bcc.is_empty() {
            headers.push(format!("Bcc: {}", join(&self.bcc)));
        }
        if let Some(reply_to) = &self.reply_to {
            headers.push(format!("Reply-To: {reply_to}"));
        }
        headers.push(format!("Subject: {}", encode_header_value("Subject", &self.subject)));
        headers.push("MIME-Version: 1.0".into());

        let body = match (&self.text, &self.html) {
            (Some(text), Some(html)) => {
                headers.push(format!(
                    "Content-Type: multipart/alternative; boundary=\"{boundary}\""
                ));
                [
                    format!("--{boundary}"),
                    "Content-Type: text/plain; charset=\"UTF-8\"".into(),
                    String::new(),
                    text.clone(),
                    format!("--{boundary}"),
                    "Content-Type: text/html; charset=\"UTF-8\"".into(),
                    String::new(),
                    html.clone(),
                    format!("--{boundary}--"),
                ]
                .join("\r\n")
            }
            (None, Some(html)) => {
                headers.push("Content-Type: text/html; charset=\"UTF-8\"".into());
                html.clone()
            }
            (Some(text), None) => {
                headers.push("Content-Type: text/plain; charset=\"UTF-8\"".into());
                text.clone()
            }
            (None, None) => return Err(MimeError::MissingBody),
        };

        Ok(format!("{}\r\n\r\n{}", headers.join("\r\n"), body))
    }

    /// The `raw` field Gmail expects: the rendered message, base64url without padding.
    pub fn to_gmail_raw(&self) -> Result<String, MimeError> {
        Ok(URL_SAFE_NO_PAD.encode(self.render()?))
    }
}

fn join(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(", ")
}

fn reject_line_breaks(field: &'static str, value: &str) -> Result<(), MimeError> {
    if value.contains(['\r', '\n']) {
        return Err(MimeError::HeaderInjection(field));
    }
    Ok(())
}

/// Plain ASCII values that fit on one line are kept as they are. Anything
/// else becomes a run of RFC 2047 encoded-words, one per folded line.
fn encode_header_value(field: &str, value: &str) -> String {
    if value.is_ascii() && field.len() + ": ".len() + value.len() <= MAX_LINE_LENGTH {
        return value.to_string();
    }
    encoded_words(value)
}

fn encoded_words(value: &str) -> String {
    utf8_chunks(value, ENCODED_WORD_BYTES)
        .into_iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk)))
        .collect::<Vec<String>>()
        .join("\r\n ")
}

/// Splits on char boundaries into slices of at most `max_bytes`.
fn utf8_chunks(value: &str, max_bytes: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if i + c.len_utf8() - start > max_bytes {
            chunks.push(&value[start..i]);
            start = i;
        }
    }
    if start < value.len() {
        chunks.push(&value[start..]);
    }
    chunks
}

fn encode_display_name(name: &str, address_len: usize) -> String {
    let line_length = "From: ".len() + name.len() + " <>".len() + address_len;
    if !name.is_ascii() || line_length > MAX_LINE_LENGTH {
        return encoded_words(name);
    }
    if name
        .chars()
        .any(|c| matches!(c, '"' | ',' | ':' | ';' | '<' | '>' | '@' | '(' | ')' | '.' | '\\'))
    {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_string()
    }
}
