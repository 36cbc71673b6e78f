//! Gmail API response normalization
//!
//! Converts Gmail API responses to triage domain models.

use base64::prelude::*;

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::EmailMessage;

/// Normalize a Gmail API message
///
/// Missing headers become empty strings. The body prefers HTML over plain
/// text and is empty when the message has neither.
pub fn normalize_message(gmail_msg: GmailMessage) -> EmailMessage {
    let payload = gmail_msg.payload.unwrap_or_default();

    let header = |name: &str| extract_header(&payload, name).unwrap_or_default();
    let body = extract_html_body(&payload)
        .or_else(|| extract_plain_text_body(&payload))
        .unwrap_or_default();

    let message = EmailMessage::new(gmail_msg.id)
        .with_subject(header("Subject"))
        .with_from(header("From"))
        .with_date(header("Date"))
        .with_snippet(decode_html_entities(&gmail_msg.snippet))
        .with_body(body);

    if gmail_msg.thread_id.is_empty() {
        message
    } else {
        message.with_thread_id(gmail_msg.thread_id)
    }
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

fn is_mime(mime_type: Option<&String>, prefix: &str) -> bool {
    mime_type.is_some_and(|m| m.starts_with(prefix))
}

/// Extract plain text body from message payload
fn extract_plain_text_body(payload: &MessagePayload) -> Option<String> {
    if let Some(parts) = &payload.parts {
        return find_in_parts(parts, "text/plain");
    }

    // Single-part message: take whatever body it carries
    let data = payload.body.as_ref()?.data.as_ref()?;
    decode_base64_body(data)
}

/// Extract HTML body from message payload
fn extract_html_body(payload: &MessagePayload) -> Option<String> {
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && is_mime(payload.mime_type.as_ref(), "text/html")
    {
        return decode_base64_body(data);
    }

    find_in_parts(payload.parts.as_deref()?, "text/html")
}

/// Recursively search message parts for the first body of a MIME type
fn find_in_parts(parts: &[MessagePart], mime_prefix: &str) -> Option<String> {
    for part in parts {
        if is_mime(part.mime_type.as_ref(), mime_prefix)
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        if let Some(nested) = &part.parts
            && let Some(text) = find_in_parts(nested, mime_prefix)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders
        .iter()
        .filter_map(|decoder| decoder.decode(data).ok())
        .find_map(|decoded| String::from_utf8(decoded).ok())
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
