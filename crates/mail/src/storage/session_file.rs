//! JSON-file session persistence
//!
//! All sessions live in one file as a map from session id to token record.
//! Every write rewrites the whole file.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::traits::SessionStore;
use crate::auth::SessionToken;

type SessionMap = BTreeMap<String, SessionToken>;

/// Session store backed by a JSON file
pub struct FileSessionStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<SessionMap> {
        if !self.path.exists() {
            return Ok(SessionMap::new());
        }
        ::config::load_json_file(&self.path)
    }

    fn write_all(&self, sessions: &SessionMap) -> Result<()> {
        ::config::save_json_file(&self.path, sessions)
    }
}

impl SessionStore for FileSessionStore {
    fn get_session(&self, session_id: &str) -> Result<Option<SessionToken>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(session_id))
    }

    fn put_session(&self, session_id: &str, token: &SessionToken) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sessions = self.read_all()?;
        sessions.insert(session_id.to_string(), token.clone());
        self.write_all(&sessions)
    }

    fn remove_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sessions = self.read_all()?;
        if sessions.remove(session_id).is_some() {
            self.write_all(&sessions)?;
        }
        Ok(())
    }
}
