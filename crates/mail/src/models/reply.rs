//! Reply records drafted by the assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Insights;

/// Database identifier of a stored reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplyId(pub i64);

impl std::fmt::Display for ReplyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReplyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A reply ready to be inserted (id and timestamps assigned by the store)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReply {
    pub email_id: String,
    pub original_content: String,
    pub insights: Insights,
    pub ai_reply: String,
}

impl NewReply {
    pub fn new(
        email_id: impl Into<String>,
        original_content: impl Into<String>,
        insights: Insights,
        ai_reply: impl Into<String>,
    ) -> Self {
        Self {
            email_id: email_id.into(),
            original_content: original_content.into(),
            insights,
            ai_reply: ai_reply.into(),
        }
    }
}

/// A stored reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRecord {
    pub id: ReplyId,
    pub email_id: String,
    pub original_content: String,
    pub insights: Insights,
    pub ai_reply: String,
    /// Whether the reply has been sent through the mail provider
    pub sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReplyRecord {
    /// Materialize an inserted reply
    pub fn from_new(id: ReplyId, reply: NewReply, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            email_id: reply.email_id,
            original_content: reply.original_content,
            insights: reply.insights,
            ai_reply: reply.ai_reply,
            sent: false,
            created_at,
            updated_at: created_at,
        }
    }
}
