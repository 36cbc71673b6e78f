//! Distinguished errors that front ends branch on
//!
//! These travel inside `anyhow::Error`; recover them with `downcast_ref`.

use crate::models::ReplyId;

/// Failures a caller is expected to handle specifically
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriageError {
    /// No session record exists, or the mail provider rejected the token
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session's refresh attempt failed; a new sign-in is required
    #[error("Session expired and could not be refreshed; sign in again")]
    SessionExpired,

    /// A required request field was missing or empty
    #[error("{0} is required")]
    MissingField(&'static str),

    /// No stored reply has this id
    #[error("Reply {0} not found")]
    ReplyNotFound(ReplyId),
}

impl TriageError {
    /// Whether the remedy is re-authentication
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::SessionExpired)
    }
}

/// Reject a missing or blank field
pub(crate) fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, TriageError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(TriageError::MissingField(field))
    } else {
        Ok(value)
    }
}
