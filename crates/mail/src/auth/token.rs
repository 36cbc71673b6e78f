//! Session token lifecycle
//!
//! A [`SessionToken`] carries the access token, optional refresh token,
//! expiry (epoch milliseconds) and an optional error tag. [`ensure_fresh_token`]
//! takes a record and returns one that either holds a non-expired access token
//! or is flagged with [`TokenError::RefreshFailed`]. It never fails itself.
//!
//! States:
//! - `Fresh`: now < expires_at, no error
//! - `ExpiredPendingRefresh`: now >= expires_at, no error
//! - `Errored`: a refresh failed; sticky until a new consent replaces the record

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::provider::{ConsentResponse, RefreshError, TokenEndpoint};
use crate::config::ProviderConfig;

/// Lifetime assumed when the provider omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Error tag attached to a session record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TokenError {
    #[serde(rename = "RefreshAccessTokenError")]
    #[error("RefreshAccessTokenError")]
    RefreshFailed,
}

/// Lifecycle state of a session record at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenState {
    Fresh,
    ExpiredPendingRefresh,
    Errored,
}

/// OAuth tokens attached to one user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenError>,
}

impl SessionToken {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>, expires_at: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            error: None,
        }
    }

    /// Build the record for a completed consent
    ///
    /// An absolute `expires_at` (epoch seconds) wins over `expires_in`, which
    /// defaults to [`DEFAULT_EXPIRES_IN_SECS`]. A consent without a refresh
    /// token keeps the one from `previous`.
    pub fn from_consent(consent: ConsentResponse, previous: Option<&SessionToken>, now_ms: i64) -> Self {
        let expires_at = match consent.expires_at {
            Some(at_secs) => at_secs.saturating_mul(1000),
            None => now_ms.saturating_add(secs_to_millis(
                consent.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            )),
        };

        let refresh_token = consent
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        Self {
            access_token: consent.access_token,
            refresh_token,
            expires_at,
            error: None,
        }
    }

    /// State of this record at `now_ms`
    pub fn state(&self, now_ms: i64) -> TokenState {
        if self.error.is_some() {
            TokenState::Errored
        } else if now_ms < self.expires_at {
            TokenState::Fresh
        } else {
            TokenState::ExpiredPendingRefresh
        }
    }

    /// The access token, unless the record is flagged
    pub fn usable_access_token(&self) -> Result<&str, TokenError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(&self.access_token),
        }
    }

    fn flagged(self, err: TokenError) -> Self {
        Self {
            error: Some(err),
            ..self
        }
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// [`ensure_fresh_token_at`] with the wall clock
pub fn ensure_fresh_token(
    record: SessionToken,
    provider: &ProviderConfig,
    endpoint: &dyn TokenEndpoint,
) -> SessionToken {
    ensure_fresh_token_at(record, provider, endpoint, now_millis())
}

/// Return a record with a usable access token, or one flagged `RefreshFailed`
///
/// Fresh and errored records come back unchanged without touching the
/// network. An expired record without a refresh token is flagged without a
/// network call.
pub fn ensure_fresh_token_at(
    record: SessionToken,
    provider: &ProviderConfig,
    endpoint: &dyn TokenEndpoint,
    now_ms: i64,
) -> SessionToken {
    match record.state(now_ms) {
        TokenState::Fresh => return record,
        TokenState::Errored => {
            debug!("Session token is flagged; waiting for a new sign-in");
            return record;
        }
        TokenState::ExpiredPendingRefresh => {}
    }

    let Some(refresh_token) = record.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
        warn!(
            "Access token expired and cannot be refreshed: {}",
            RefreshError::MissingRefreshToken
        );
        return record.flagged(TokenError::RefreshFailed);
    };

    match endpoint.refresh(provider, refresh_token) {
        Ok(refreshed) => {
            let expires_in = refreshed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
            info!("Refreshed access token (valid for {}s)", expires_in);
            SessionToken {
                access_token: refreshed.access_token,
                refresh_token: record.refresh_token,
                expires_at: now_ms.saturating_add(secs_to_millis(expires_in)),
                error: None,
            }
        }
        Err(e) => {
            error!("Failed to refresh access token: {}", e);
            record.flagged(TokenError::RefreshFailed)
        }
    }
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}
