//! Storage trait definitions

use anyhow::Result;

use crate::auth::SessionToken;
use crate::models::{NewReply, ReplyId, ReplyRecord};

/// Upper bound on `recent_replies`
pub const MAX_RECENT_REPLIES: usize = 50;

/// Trait for reply record storage
///
/// Replies are inserted once; the only mutation afterwards is flipping the
/// `sent` flag.
pub trait ReplyStore: Send + Sync {
    /// Insert a reply, assigning its id and timestamps
    fn insert_reply(&self, reply: NewReply) -> Result<ReplyRecord>;

    /// Get a reply by ID
    fn get_reply(&self, id: ReplyId) -> Result<Option<ReplyRecord>>;

    /// Most recent replies first, at most `min(limit, MAX_RECENT_REPLIES)`
    fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>>;

    /// Replies drafted for one email, most recent first
    fn replies_for_email(&self, email_id: &str) -> Result<Vec<ReplyRecord>>;

    /// Mark a reply as sent; returns false if no such reply exists
    fn mark_sent(&self, id: ReplyId) -> Result<bool>;

    /// Count stored replies
    fn count_replies(&self) -> Result<usize>;
}

/// Trait for session token persistence, keyed by session id
pub trait SessionStore: Send + Sync {
    fn get_session(&self, session_id: &str) -> Result<Option<SessionToken>>;

    /// Insert or replace the record for a session
    fn put_session(&self, session_id: &str, token: &SessionToken) -> Result<()>;

    /// Remove a session; removing an unknown session is not an error
    fn remove_session(&self, session_id: &str) -> Result<()>;
}

/// Clamp a caller-supplied limit to `1..=MAX_RECENT_REPLIES`
pub(crate) fn clamp_recent_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_RECENT_REPLIES)
}
