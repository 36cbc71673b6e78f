//! Gmail API integration
//!
//! This module provides:
//! - The [`Mailbox`] seam the triage service reads and sends through
//! - A Gmail REST client authorized by the session manager
//! - Response normalization to domain models
//! - Raw message composition for sending

mod client;
mod compose;
mod normalize;

use anyhow::Result;

use crate::models::{EmailMessage, MessageId, OutgoingEmail};

pub use client::GmailClient;
pub use compose::encode_raw_message;
pub use normalize::normalize_message;

/// Mail provider operations used by the triage service
pub trait Mailbox: Send + Sync {
    /// Newest message ids, optionally filtered by a provider search query
    fn list_message_ids(&self, max_results: usize, query: Option<&str>) -> Result<Vec<MessageId>>;

    /// Fetch one message in full
    fn fetch_message(&self, id: &MessageId) -> Result<EmailMessage>;

    /// Send a plain-text message, returning the provider's id for it
    fn send_message(&self, email: &OutgoingEmail) -> Result<MessageId>;
}

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Full message from Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        #[serde(default)]
        pub thread_id: String,
        #[serde(default)]
        pub snippet: String,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body (may be base64 encoded)
    #[derive(Debug, Deserialize)]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub mime_type: Option<String>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Body of `users.messages.send`
    #[derive(Debug, Serialize)]
    pub struct SendMessageRequest {
        pub raw: String,
    }

    /// Response of `users.messages.send`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendMessageResponse {
        pub id: String,
        pub thread_id: Option<String>,
    }
}
