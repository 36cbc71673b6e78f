//! Mail crate - Business logic for AI-assisted email triage
//!
//! This crate provides:
//! - OAuth session token lifecycle (freshness tracking and refresh)
//! - Consent (authorization code) flow for Gmail
//! - Gmail API client for listing, fetching and sending messages
//! - LLM-backed insight extraction and reply drafting
//! - Reply record storage (SQLite and in-memory)
//! - A triage service composing the above for front ends
//!
//! HTTP is synchronous (ureq), so every operation runs to completion on the
//! calling thread.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod storage;
pub mod triage;

pub use ai::{GeminiClient, TextGenerator};
pub use auth::{
    ConsentResponse, HttpTokenEndpoint, SessionManager, SessionToken, TokenEndpoint, TokenError,
    TokenState, ensure_fresh_token, ensure_fresh_token_at,
};
pub use self::config::{ProviderConfig, TriageSettings};
pub use error::TriageError;
pub use gmail::{GmailClient, Mailbox};
pub use models::{
    EmailAddress, EmailMessage, Insights, MessageId, NewReply, OutgoingEmail, ReplyId,
    ReplyRecord, Sentiment, Urgency,
};
pub use storage::{
    FileSessionStore, InMemoryReplyStore, InMemorySessionStore, ReplyStore, SessionStore,
    SqliteReplyStore,
};
pub use triage::{AnalyzedEmail, StatusReport, TriageService};
