//! Gmail API HTTP client
//!
//! Every request asks the session manager for a usable access token first,
//! so an expired token is refreshed (or reported) before Gmail sees it.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::Mailbox;
use super::api::{GmailMessage, ListMessagesResponse, SendMessageRequest, SendMessageResponse};
use super::compose::encode_raw_message;
use super::normalize::normalize_message;
use crate::auth::SessionManager;
use crate::error::TriageError;
use crate::models::{EmailMessage, MessageId, OutgoingEmail};

/// Attempts for idempotent reads
const MAX_ATTEMPTS: u32 = 3;

/// Gmail API client bound to one session
pub struct GmailClient {
    sessions: Arc<SessionManager>,
    session_id: String,
    base_url: String,
}

impl GmailClient {
    /// Gmail API base URL
    pub const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new(sessions: Arc<SessionManager>, session_id: impl Into<String>) -> Self {
        Self {
            sessions,
            session_id: session_id.into(),
            base_url: Self::BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn bearer(&self) -> Result<String> {
        let token = self.sessions.access_token(&self.session_id)?;
        Ok(format!("Bearer {}", token))
    }

    fn list_url(&self, max_results: usize, query: Option<&str>) -> String {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}",
            self.base_url,
            max_results.clamp(1, 500)
        );
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            url.push_str(&format!("&q={}", urlencoding::encode(q)));
        }
        url
    }

    /// GET a JSON resource with exponential backoff on transient failures
    fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            let bearer = self.bearer()?;
            match ureq::get(url).header("Authorization", &bearer).call() {
                Ok(mut response) => {
                    return response
                        .body_mut()
                        .read_json()
                        .with_context(|| format!("Failed to parse {} response", what));
                }
                Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    warn!("Gmail {} attempt {} failed: {}; retrying", what, attempt, e);
                    std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(api_error(e, what)),
            }
        }
    }
}

impl Mailbox for GmailClient {
    fn list_message_ids(&self, max_results: usize, query: Option<&str>) -> Result<Vec<MessageId>> {
        let url = self.list_url(max_results, query);
        let list: ListMessagesResponse = self.get_json(&url, "list messages")?;

        let ids: Vec<MessageId> = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect();
        debug!("Listed {} message ids", ids.len());
        Ok(ids)
    }

    fn fetch_message(&self, id: &MessageId) -> Result<EmailMessage> {
        let url = format!(
            "{}/users/me/messages/{}?format=full",
            self.base_url,
            urlencoding::encode(id.as_str())
        );
        let message: GmailMessage = self.get_json(&url, "get message")?;
        Ok(normalize_message(message))
    }

    fn send_message(&self, email: &OutgoingEmail) -> Result<MessageId> {
        let url = format!("{}/users/me/messages/send", self.base_url);
        let request = SendMessageRequest {
            raw: encode_raw_message(email),
        };

        let mut response = ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(&request)
            .map_err(|e| api_error(e, "send message"))?;

        let sent: SendMessageResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse send message response")?;

        Ok(MessageId::new(sent.id))
    }
}

/// Rate limits, server errors and connection problems are worth retrying
fn is_transient(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(code) => *code == 429 || *code >= 500,
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => true,
        _ => false,
    }
}

/// Map a failed Gmail call, turning 401 into `NotAuthenticated`
fn api_error(error: ureq::Error, what: &str) -> anyhow::Error {
    match error {
        ureq::Error::StatusCode(401) => TriageError::NotAuthenticated.into(),
        ureq::Error::StatusCode(code) => {
            anyhow::anyhow!("Gmail {} request failed with HTTP {}", what, code)
        }
        other => anyhow::Error::new(other).context(format!("Failed to send {} request", what)),
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
