//! Session materialization
//!
//! [`SessionManager`] loads a session's [`SessionToken`] from a
//! [`SessionStore`], runs it through the token lifecycle and persists the
//! result. Refreshes for the same session are serialized: a caller that finds
//! the token expired takes the session's refresh lock, re-reads the record and
//! only refreshes if no one else already did. Sign-in and sign-out take the
//! same lock, so a slow refresh cannot overwrite the record they write.

use anyhow::Result;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::provider::{ConsentResponse, TokenEndpoint};
use super::token::{SessionToken, TokenState, ensure_fresh_token_at, now_millis};
use crate::config::ProviderConfig;
use crate::error::TriageError;
use crate::storage::SessionStore;

/// Owns the provider config and session persistence for token materialization
pub struct SessionManager {
    provider: ProviderConfig,
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<dyn SessionStore>,
    /// One lock per session id, held around refresh, sign-in and sign-out
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        provider: ProviderConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            provider,
            endpoint,
            store,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn endpoint(&self) -> &dyn TokenEndpoint {
        self.endpoint.as_ref()
    }

    /// Store the record for a completed consent, replacing any errored one
    pub fn sign_in(&self, session_id: &str, consent: ConsentResponse) -> Result<SessionToken> {
        self.sign_in_at(session_id, consent, now_millis())
    }

    pub fn sign_in_at(
        &self,
        session_id: &str,
        consent: ConsentResponse,
        now_ms: i64,
    ) -> Result<SessionToken> {
        let lock = self.refresh_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.store.get_session(session_id)?;
        let token = SessionToken::from_consent(consent, previous.as_ref(), now_ms);
        self.store.put_session(session_id, &token)?;

        info!(
            "Signed in session '{}' (refresh token {})",
            session_id,
            if token.refresh_token.is_some() { "present" } else { "absent" }
        );
        Ok(token)
    }

    /// Drop the session record (no provider-side revocation)
    pub fn sign_out(&self, session_id: &str) -> Result<()> {
        let lock = self.refresh_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.store.remove_session(session_id)?;
        self.refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);

        info!("Signed out session '{}'", session_id);
        Ok(())
    }

    /// Stored record without any refresh attempt
    pub fn current(&self, session_id: &str) -> Result<Option<SessionToken>> {
        self.store.get_session(session_id)
    }

    /// State of the stored record right now, `None` when signed out
    pub fn state(&self, session_id: &str) -> Result<Option<TokenState>> {
        let now = now_millis();
        Ok(self.current(session_id)?.map(|token| token.state(now)))
    }

    /// Load the session's record, refreshing it if expired
    ///
    /// # Errors
    /// `TriageError::NotAuthenticated` when there is no record. Refresh
    /// failures are not errors; they come back as a flagged record.
    pub fn materialize(&self, session_id: &str) -> Result<SessionToken> {
        self.materialize_at(session_id, now_millis())
    }

    pub fn materialize_at(&self, session_id: &str, now_ms: i64) -> Result<SessionToken> {
        let token = self.load(session_id)?;
        if token.state(now_ms) != TokenState::ExpiredPendingRefresh {
            return Ok(token);
        }

        let lock = self.refresh_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have refreshed while we waited for the lock
        let token = self.load(session_id)?;
        let refreshed = ensure_fresh_token_at(token.clone(), &self.provider, self.endpoint(), now_ms);
        if refreshed == token {
            return Ok(refreshed);
        }

        // Only replace the record this refresh started from
        match self.store.get_session(session_id)? {
            Some(current) if current == token => {
                self.store.put_session(session_id, &refreshed)?;
                Ok(refreshed)
            }
            Some(current) => {
                warn!("Session '{}' changed during refresh; keeping the newer record", session_id);
                Ok(current)
            }
            None => Err(TriageError::NotAuthenticated.into()),
        }
    }

    /// A usable bearer token for the session
    ///
    /// # Errors
    /// `TriageError::NotAuthenticated` without a record,
    /// `TriageError::SessionExpired` when the record is flagged.
    pub fn access_token(&self, session_id: &str) -> Result<String> {
        let token = self.materialize(session_id)?;
        match token.usable_access_token() {
            Ok(access_token) => Ok(access_token.to_string()),
            Err(_) => Err(TriageError::SessionExpired.into()),
        }
    }

    fn load(&self, session_id: &str) -> Result<SessionToken> {
        self.store
            .get_session(session_id)?
            .ok_or_else(|| TriageError::NotAuthenticated.into())
    }

    fn refresh_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }
}
