//! In-memory storage implementations
//!
//! Used by tests and by front ends that don't need persistence.

use anyhow::Result;
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::traits::{ReplyStore, SessionStore, clamp_recent_limit};
use crate::auth::SessionToken;
use crate::models::{NewReply, ReplyId, ReplyRecord};

/// In-memory implementation of ReplyStore
pub struct InMemoryReplyStore {
    replies: RwLock<Vec<ReplyRecord>>,
}

impl InMemoryReplyStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            replies: RwLock::new(Vec::new()),
        }
    }

    /// Newest first, ties broken by id
    fn sorted(replies: impl Iterator<Item = ReplyRecord>) -> Vec<ReplyRecord> {
        let mut list: Vec<_> = replies.collect();
        list.sort_by_key(|r| Reverse((r.created_at, r.id)));
        list
    }
}

impl Default for InMemoryReplyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyStore for InMemoryReplyStore {
    fn insert_reply(&self, reply: NewReply) -> Result<ReplyRecord> {
        let mut replies = self.replies.write().unwrap_or_else(PoisonError::into_inner);
        let id = ReplyId(replies.iter().map(|r| r.id.0).max().unwrap_or(0) + 1);
        let record = ReplyRecord::from_new(id, reply, Utc::now());
        replies.push(record.clone());
        Ok(record)
    }

    fn get_reply(&self, id: ReplyId) -> Result<Option<ReplyRecord>> {
        let replies = self.replies.read().unwrap_or_else(PoisonError::into_inner);
        Ok(replies.iter().find(|r| r.id == id).cloned())
    }

    fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>> {
        let replies = self.replies.read().unwrap_or_else(PoisonError::into_inner);
        let mut list = Self::sorted(replies.iter().cloned());
        list.truncate(clamp_recent_limit(limit));
        Ok(list)
    }

    fn replies_for_email(&self, email_id: &str) -> Result<Vec<ReplyRecord>> {
        let replies = self.replies.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::sorted(
            replies.iter().filter(|r| r.email_id == email_id).cloned(),
        ))
    }

    fn mark_sent(&self, id: ReplyId) -> Result<bool> {
        let mut replies = self.replies.write().unwrap_or_else(PoisonError::into_inner);
        match replies.iter_mut().find(|r| r.id == id) {
            Some(reply) => {
                reply.sent = true;
                reply.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count_replies(&self) -> Result<usize> {
        Ok(self
            .replies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionToken>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_session(&self, session_id: &str) -> Result<Option<SessionToken>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(session_id).cloned())
    }

    fn put_session(&self, session_id: &str, token: &SessionToken) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session_id.to_string(), token.clone());
        Ok(())
    }

    fn remove_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
        Ok(())
    }
}
